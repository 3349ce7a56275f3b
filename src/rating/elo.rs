//! Multiplayer Elo
//!
//! A game is decomposed into every ordered pair of participants. Each player's
//! expected-versus-actual difference is averaged over their opponents, so the
//! size of a rating swing does not depend on how many people sat at the table.

use crate::error::{RatingError, Result};
use crate::rating::outcome::compare_positions;
use crate::types::{EloChange, EloParticipant};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// One step of the K-factor schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KFactorTier {
    /// Applies once a player has played at least this many games
    pub min_games_played: u32,
    pub k: f64,
}

/// Configuration for the multiplayer Elo updater
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EloConfig {
    /// Rating given to newly registered players
    pub initial_rating: f64,
    /// Rating difference at which the stronger player is expected to score 10:1
    pub scale: f64,
    /// Ordered by `min_games_played`, starting at zero
    pub k_factor_schedule: Vec<KFactorTier>,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            initial_rating: 1000.0,
            scale: 400.0,
            k_factor_schedule: vec![
                KFactorTier {
                    min_games_played: 0,
                    k: 40.0,
                },
                KFactorTier {
                    min_games_played: 10,
                    k: 32.0,
                },
                KFactorTier {
                    min_games_played: 30,
                    k: 24.0,
                },
            ],
        }
    }
}

impl EloConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.scale <= 0.0 {
            return Err(RatingError::ConfigurationError {
                message: "Elo scale must be positive".to_string(),
            }
            .into());
        }

        let first = self.k_factor_schedule.first().ok_or_else(|| {
            RatingError::ConfigurationError {
                message: "K-factor schedule must not be empty".to_string(),
            }
        })?;
        if first.min_games_played != 0 {
            return Err(RatingError::ConfigurationError {
                message: "K-factor schedule must start at zero games played".to_string(),
            }
            .into());
        }

        for window in self.k_factor_schedule.windows(2) {
            if window[1].min_games_played <= window[0].min_games_played {
                return Err(RatingError::ConfigurationError {
                    message: "K-factor thresholds must be strictly increasing".to_string(),
                }
                .into());
            }
        }

        if self.k_factor_schedule.iter().any(|tier| tier.k <= 0.0) {
            return Err(RatingError::ConfigurationError {
                message: "K-factor values must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// K applied to a player with the given experience
    pub fn k_factor(&self, games_played: u32) -> f64 {
        self.k_factor_schedule
            .iter()
            .rev()
            .find(|tier| tier.min_games_played <= games_played)
            .map(|tier| tier.k)
            .unwrap_or(0.0)
    }
}

/// Incremental multiplayer Elo updater
#[derive(Debug, Clone)]
pub struct EloUpdater {
    config: EloConfig,
}

impl EloUpdater {
    /// Create a new updater, rejecting invalid configuration
    pub fn new(config: EloConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EloConfig {
        &self.config
    }

    /// Logistic expected score of a player rated `rating` against `opponent`
    pub fn expected_score(&self, rating: f64, opponent: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((opponent - rating) / self.config.scale))
    }

    /// Rate one game. Output order follows input order.
    pub fn update(&self, participants: &[EloParticipant]) -> Result<Vec<EloChange>> {
        validate_participants(participants)?;

        let opponents = (participants.len() - 1) as f64;

        let changes = participants
            .iter()
            .enumerate()
            .map(|(i, player)| {
                let delta: f64 = participants
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, opponent)| {
                        let actual =
                            compare_positions(player.normalized_position, opponent.normalized_position)
                                .score();
                        actual - self.expected_score(player.elo, opponent.elo)
                    })
                    .sum();

                let k = self.config.k_factor(player.games_played);
                let change = (k * delta / opponents).round();

                debug!(
                    player_id = %player.player_id,
                    k,
                    change,
                    "Elo update"
                );

                EloChange {
                    player_id: player.player_id.clone(),
                    elo_before: player.elo,
                    elo_after: player.elo + change,
                    change,
                    games_played_after: player.games_played + 1,
                }
            })
            .collect();

        Ok(changes)
    }
}

impl Default for EloUpdater {
    fn default() -> Self {
        Self {
            config: EloConfig::default(),
        }
    }
}

fn validate_participants(participants: &[EloParticipant]) -> Result<()> {
    if participants.is_empty() {
        return Err(RatingError::invalid_input("No participants provided for Elo update").into());
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
        if !participant.elo.is_finite() {
            return Err(RatingError::inconsistent_state(format!(
                "Player {} has no usable Elo rating",
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
            "Elo update needs at least two distinct players",
        )
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::rating_error;

    fn participant(id: &str, elo: f64, games_played: u32, position: f64) -> EloParticipant {
        EloParticipant {
            player_id: id.to_string(),
            elo,
            games_played,
            normalized_position: position,
        }
    }

    #[test]
    fn test_config_default_is_valid() {
        assert!(EloConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EloConfig::default();
        config.k_factor_schedule.clear();
        assert!(config.validate().is_err());

        let mut config = EloConfig::default();
        config.k_factor_schedule[0].min_games_played = 5;
        assert!(config.validate().is_err());

        let mut config = EloConfig::default();
        config.k_factor_schedule[2].min_games_played = 10;
        assert!(config.validate().is_err());

        let mut config = EloConfig::default();
        config.k_factor_schedule[1].k = 0.0;
        assert!(config.validate().is_err());

        let mut config = EloConfig::default();
        config.scale = 0.0;
        assert!(EloUpdater::new(config).is_err());
    }

    #[test]
    fn test_k_factor_schedule_lookup() {
        let config = EloConfig::default();
        assert_eq!(config.k_factor(0), 40.0);
        assert_eq!(config.k_factor(9), 40.0);
        assert_eq!(config.k_factor(10), 32.0);
        assert_eq!(config.k_factor(29), 32.0);
        assert_eq!(config.k_factor(500), 24.0);
    }

    #[test]
    fn test_expected_score() {
        let updater = EloUpdater::default();
        assert!((updater.expected_score(1000.0, 1000.0) - 0.5).abs() < 1e-12);
        let favourite = updater.expected_score(1400.0, 1000.0);
        assert!((favourite - 10.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_four_player_descending_field() {
        let updater = EloUpdater::default();
        let players = vec![
            participant("p1", 1200.0, 10, 1.0),
            participant("p2", 1100.0, 10, 2.0),
            participant("p3", 1000.0, 10, 3.0),
            participant("p4", 900.0, 10, 4.0),
        ];

        let changes = updater.update(&players).unwrap();

        assert!(changes[0].change > 0.0);
        assert!(changes[3].change < 0.0);
        let total: f64 = changes.iter().map(|c| c.change).sum();
        assert!(total.abs() <= changes.len() as f64 * 0.5);
        for change in &changes {
            assert_eq!(change.elo_after, change.elo_before + change.change);
            assert_eq!(change.games_played_after, 11);
        }
    }

    #[test]
    fn test_two_player_tie_with_equal_ratings() {
        let updater = EloUpdater::default();
        let players = vec![
            participant("a", 1000.0, 3, 1.0),
            participant("b", 1000.0, 3, 1.0),
        ];

        let changes = updater.update(&players).unwrap();
        assert_eq!(changes[0].change, 0.0);
        assert_eq!(changes[1].change, 0.0);
    }

    #[test]
    fn test_rejoin_field_orders_results() {
        let updater = EloUpdater::default();
        let players = vec![
            participant("p1", 1000.0, 10, 1.0),
            participant("p2", 1000.0, 10, 2.0),
            participant("p3", 1000.0, 10, 3.5),
        ];

        let changes = updater.update(&players).unwrap();
        assert!(changes[0].elo_after > changes[1].elo_after);
        assert!(changes[1].elo_after > changes[2].elo_after);
    }

    #[test]
    fn test_newcomer_moves_faster() {
        let updater = EloUpdater::default();
        let players = vec![
            participant("rookie", 1000.0, 0, 1.0),
            participant("veteran", 1000.0, 100, 2.0),
        ];

        let changes = updater.update(&players).unwrap();
        assert_eq!(changes[0].change, 20.0);
        assert_eq!(changes[1].change, -12.0);
    }

    #[test]
    fn test_invalid_participants() {
        let updater = EloUpdater::default();

        let err = updater.update(&[]).unwrap_err();
        assert!(matches!(
            rating_error(&err),
            Some(RatingError::InvalidInput { .. })
        ));

        assert!(updater.update(&[participant("a", 1000.0, 0, 1.0)]).is_err());

        let duplicated = vec![
            participant("a", 1000.0, 0, 1.0),
            participant("a", 1000.0, 0, 2.0),
        ];
        assert!(updater.update(&duplicated).is_err());

        let negative = vec![
            participant("a", 1000.0, 0, -1.0),
            participant("b", 1000.0, 0, 2.0),
        ];
        assert!(updater.update(&negative).is_err());

        let missing_rating = vec![
            participant("a", f64::NAN, 0, 1.0),
            participant("b", 1000.0, 0, 2.0),
        ];
        let err = updater.update(&missing_rating).unwrap_err();
        assert!(matches!(
            rating_error(&err),
            Some(RatingError::InconsistentState { .. })
        ));
    }
}
