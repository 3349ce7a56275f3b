//! Weng-Lin (OpenSkill) rating updates
//!
//! Every participant is a one-member team. Ranks come from normalized
//! positions, tied positions share a rank, and all beliefs of a game are
//! revised together from their pre-game values.
//!
//! The default Plackett-Luce model is computed here; the Bradley-Terry full
//! pairing model is delegated to the skillratings crate.

use crate::error::{RatingError, Result};
use crate::rating::outcome::dense_ranks;
use crate::types::{OpenSkillChange, OpenSkillParticipant, SkillBelief};
use serde::{Deserialize, Serialize};
use skillratings::weng_lin::{weng_lin_multi_team, WengLinConfig, WengLinRating};
use skillratings::MultiTeamOutcome;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Ranking model used for the joint update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenSkillModel {
    PlackettLuce,
    BradleyTerryFull,
}

/// Configuration for the OpenSkill updater
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenSkillConfig {
    pub model: OpenSkillModel,
    /// Prior mean for new players
    pub mu: f64,
    /// Prior uncertainty for new players
    pub sigma: f64,
    /// Performance noise; defaults to half the prior uncertainty
    pub beta: f64,
    /// Floor on the variance shrink factor
    pub kappa: f64,
    /// Additive dynamics applied to sigma before each game
    pub tau: f64,
    /// Clamp sigma so a game can never widen a belief
    pub prevent_sigma_increase: bool,
    /// Standard deviations subtracted for the conservative ordinal
    pub z: f64,
    pub ordinal_scale: f64,
    pub ordinal_offset: f64,
}

impl Default for OpenSkillConfig {
    fn default() -> Self {
        let sigma = 25.0 / 3.0;
        Self {
            model: OpenSkillModel::PlackettLuce,
            mu: 25.0,
            sigma,
            beta: sigma / 2.0,
            kappa: 0.0001,
            tau: 0.0,
            prevent_sigma_increase: true,
            z: 3.0,
            ordinal_scale: 40.0,
            ordinal_offset: 1000.0,
        }
    }
}

impl OpenSkillConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.sigma <= 0.0 {
            return Err(RatingError::ConfigurationError {
                message: "Initial sigma must be positive".to_string(),
            }
            .into());
        }

        if self.beta <= 0.0 {
            return Err(RatingError::ConfigurationError {
                message: "Beta must be positive".to_string(),
            }
            .into());
        }

        if self.kappa <= 0.0 || self.kappa >= 1.0 {
            return Err(RatingError::ConfigurationError {
                message: "Kappa must lie in (0, 1)".to_string(),
            }
            .into());
        }

        if self.tau < 0.0 {
            return Err(RatingError::ConfigurationError {
                message: "Tau must be non-negative".to_string(),
            }
            .into());
        }

        if self.ordinal_scale <= 0.0 {
            return Err(RatingError::ConfigurationError {
                message: "Ordinal scale must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Belief given to players who have never played
    pub fn initial_belief(&self) -> SkillBelief {
        SkillBelief {
            mu: self.mu,
            sigma: self.sigma,
        }
    }

    /// Conservative skill estimate `mu - z * sigma`
    pub fn ordinal(&self, belief: SkillBelief) -> f64 {
        belief.mu - self.z * belief.sigma
    }

    /// Ordinal rescaled onto the Elo-like display range
    pub fn display_ordinal(&self, belief: SkillBelief) -> f64 {
        (self.ordinal(belief) * self.ordinal_scale + self.ordinal_offset).round()
    }
}

/// Joint OpenSkill updater
#[derive(Debug, Clone)]
pub struct OpenSkillUpdater {
    config: OpenSkillConfig,
}

impl OpenSkillUpdater {
    /// Create a new updater, rejecting invalid configuration
    pub fn new(config: OpenSkillConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &OpenSkillConfig {
        &self.config
    }

    /// Rate one game. Output order follows input order.
    pub fn update(&self, participants: &[OpenSkillParticipant]) -> Result<Vec<OpenSkillChange>> {
        validate_participants(participants)?;

        let positions: Vec<f64> = participants.iter().map(|p| p.normalized_position).collect();
        let ranks = dense_ranks(&positions);

        let priors: Vec<SkillBelief> = participants
            .iter()
            .map(|p| SkillBelief {
                mu: p.mu,
                sigma: (p.sigma.powi(2) + self.config.tau.powi(2)).sqrt(),
            })
            .collect();

        let posteriors = match self.config.model {
            OpenSkillModel::PlackettLuce => self.plackett_luce(&priors, &ranks),
            OpenSkillModel::BradleyTerryFull => self.bradley_terry_full(&priors, &ranks)?,
        };

        let changes = participants
            .iter()
            .zip(ranks)
            .zip(posteriors)
            .map(|((participant, rank), mut posterior)| {
                if self.config.prevent_sigma_increase && posterior.sigma > participant.sigma {
                    posterior.sigma = participant.sigma;
                }

                let before = SkillBelief {
                    mu: participant.mu,
                    sigma: participant.sigma,
                };
                let ordinal_before = self.config.display_ordinal(before);
                let ordinal_after = self.config.display_ordinal(posterior);

                debug!(
                    player_id = %participant.player_id,
                    rank,
                    mu = posterior.mu,
                    sigma = posterior.sigma,
                    "OpenSkill update"
                );

                OpenSkillChange {
                    player_id: participant.player_id.clone(),
                    rank,
                    mu_before: participant.mu,
                    sigma_before: participant.sigma,
                    mu_after: posterior.mu,
                    sigma_after: posterior.sigma,
                    ordinal_before,
                    ordinal_after,
                    ordinal_change: ordinal_after - ordinal_before,
                }
            })
            .collect();

        Ok(changes)
    }

    /// Plackett-Luce update (Weng & Lin 2011, algorithm 4) with shared ranks
    fn plackett_luce(&self, priors: &[SkillBelief], ranks: &[usize]) -> Vec<SkillBelief> {
        let beta_sq = self.config.beta.powi(2);
        let c = priors
            .iter()
            .map(|b| b.sigma.powi(2) + beta_sq)
            .sum::<f64>()
            .sqrt();

        // Shifting every mean by the same amount leaves the quotients unchanged
        let max_mu = priors
            .iter()
            .map(|b| b.mu)
            .fold(f64::NEG_INFINITY, f64::max);
        let strengths: Vec<f64> = priors.iter().map(|b| ((b.mu - max_mu) / c).exp()).collect();

        let sum_q: Vec<f64> = ranks
            .iter()
            .map(|rank_q| {
                strengths
                    .iter()
                    .zip(ranks)
                    .filter(|(_, rank_i)| *rank_i >= rank_q)
                    .map(|(strength, _)| strength)
                    .sum()
            })
            .collect();
        let tied_with: Vec<f64> = ranks
            .iter()
            .map(|rank_q| ranks.iter().filter(|rank| *rank == rank_q).count() as f64)
            .collect();

        priors
            .iter()
            .enumerate()
            .map(|(i, prior)| {
                let mut omega = 0.0;
                let mut delta = 0.0;

                for q in 0..priors.len() {
                    if ranks[q] > ranks[i] {
                        continue;
                    }
                    let quotient = strengths[i] / sum_q[q];
                    if q == i {
                        omega += (1.0 - quotient) / tied_with[q];
                    } else {
                        omega -= quotient / tied_with[q];
                    }
                    delta += quotient * (1.0 - quotient) / tied_with[q];
                }

                let variance = prior.sigma.powi(2);
                let gamma = prior.sigma / c;
                omega *= variance / c;
                delta *= gamma * variance / c.powi(2);

                SkillBelief {
                    mu: prior.mu + omega,
                    sigma: prior.sigma * (1.0 - delta).max(self.config.kappa).sqrt(),
                }
            })
            .collect()
    }

    fn bradley_terry_full(
        &self,
        priors: &[SkillBelief],
        ranks: &[usize],
    ) -> Result<Vec<SkillBelief>> {
        let config = WengLinConfig {
            beta: self.config.beta,
            uncertainty_tolerance: self.config.kappa,
        };

        let teams: Vec<Vec<WengLinRating>> = priors.iter().map(|b| vec![(*b).into()]).collect();
        let teams_refs: Vec<(&[WengLinRating], MultiTeamOutcome)> = teams
            .iter()
            .zip(ranks)
            .map(|(team, rank)| (team.as_slice(), MultiTeamOutcome::new(*rank)))
            .collect();

        let results = weng_lin_multi_team(&teams_refs, &config);

        priors
            .iter()
            .enumerate()
            .map(|(i, prior)| match results.get(i).and_then(|team| team.first()) {
                Some(rating) => Ok(SkillBelief::from(*rating)),
                None => {
                    warn!("Missing Bradley-Terry result for participant {}", i);
                    Err(RatingError::InternalError {
                        message: format!("No rating returned for participant with mu {}", prior.mu),
                    }
                    .into())
                }
            })
            .collect()
    }
}

impl Default for OpenSkillUpdater {
    fn default() -> Self {
        Self {
            config: OpenSkillConfig::default(),
        }
    }
}

fn validate_participants(participants: &[OpenSkillParticipant]) -> Result<()> {
    if participants.is_empty() {
        return Err(
            RatingError::invalid_input("No participants provided for OpenSkill update").into(),
        );
    }

    let mut seen = HashSet::new();
    for participant in participants {
        if !seen.insert(participant.player_id.as_str()) {
            return Err(RatingError::invalid_input(format!(
                "Player {} appears more than once; normalize rankings first",
                participant.player_id
            ))
            .into());
        }
        if !participant.mu.is_finite() || !participant.sigma.is_finite() || participant.sigma <= 0.0
        {
            return Err(RatingError::inconsistent_state(format!(
                "Player {} has no usable OpenSkill belief",
                participant.player_id
            ))
            .into());
        }
        if !participant.normalized_position.is_finite() || participant.normalized_position < 0.0 {
            return Err(RatingError::invalid_input(format!(
                "Invalid normalized position {} for player {}",
                participant.normalized_position, participant.player_id
            ))
            .into());
        }
    }

    if seen.len() < 2 {
        return Err(RatingError::invalid_input(
            "OpenSkill update needs at least two distinct players",
        )
        .into());
    }

    Ok(())
}
