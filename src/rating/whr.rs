//! Whole-History Rating
//!
//! Batch estimation of every player's skill trajectory from the complete game
//! history. Each player has one latent rating per game played; consecutive
//! ratings of the same player are tied together by a Wiener process prior
//! whose variance grows with the time between games. Pairwise results inside a
//! game follow a Bradley-Terry model, draws counting as half a win.
//!
//! The history is stored as an arena of anchors (one per player per game)
//! indexed by player track and by game. The optimizer runs Newton steps on one
//! player's whole track at a time (the Hessian of a track is tridiagonal) and
//! sweeps over players in a fixed order until the largest movement of a sweep
//! drops below the tolerance.

use crate::error::{RatingError, Result};
use crate::rating::normalizer::normalize;
use crate::rating::outcome::compare_positions;
use crate::types::{GameId, PlayerId, WhrGame, WhrResult};
use crate::utils::days_between;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::f64::consts::LN_10;
use tracing::{debug, info, warn};

/// Elo points per natural-scale rating unit
const ELO_PER_NATURAL: f64 = 400.0 / LN_10;

/// Largest movement of a single anchor in one Newton step (natural scale)
const MAX_NEWTON_STEP: f64 = 1.0;

/// Configuration for the WHR engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhrConfig {
    /// Wiener process variance in Elo² per day between two games of a player
    pub w2_per_day: f64,
    /// Variance in Elo² added for every consecutive pair of games, even when
    /// they share a timestamp
    pub step_variance: f64,
    /// Weight of the virtual draws anchoring each player's first game to the
    /// display center
    pub virtual_games: f64,
    pub max_iterations: usize,
    /// Largest per-sweep movement (Elo points) accepted as converged
    pub convergence_tolerance: f64,
    /// Display rating of the center of the latent scale
    pub display_offset: f64,
}

impl Default for WhrConfig {
    fn default() -> Self {
        Self {
            w2_per_day: 14.0,
            step_variance: 25.0,
            virtual_games: 2.0,
            max_iterations: 500,
            convergence_tolerance: 0.01,
            display_offset: 1000.0,
        }
    }
}

impl WhrConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.w2_per_day < 0.0 {
            return Err(RatingError::ConfigurationError {
                message: "WHR w2 must be non-negative".to_string(),
            }
            .into());
        }

        if self.step_variance <= 0.0 {
            return Err(RatingError::ConfigurationError {
                message: "WHR step variance must be positive".to_string(),
            }
            .into());
        }

        if self.virtual_games <= 0.0 {
            return Err(RatingError::ConfigurationError {
                message: "WHR virtual games must be positive".to_string(),
            }
            .into());
        }

        if self.max_iterations == 0 {
            return Err(RatingError::ConfigurationError {
                message: "WHR max iterations must be at least 1".to_string(),
            }
            .into());
        }

        if self.convergence_tolerance <= 0.0 {
            return Err(RatingError::ConfigurationError {
                message: "WHR convergence tolerance must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Prior variance (natural scale) between two games `gap_days` apart
    fn transition_variance(&self, gap_days: f64) -> f64 {
        (self.w2_per_day * gap_days + self.step_variance) / ELO_PER_NATURAL.powi(2)
    }

    fn to_display(&self, natural: f64) -> f64 {
        (self.display_offset + natural * ELO_PER_NATURAL).round()
    }
}

/// A player's rating at one game
#[derive(Debug, Clone)]
struct Anchor {
    game: usize,
    rating: f64,
    observations: Vec<Observation>,
}

/// One pairwise result seen from the anchor's side
#[derive(Debug, Clone, Copy)]
struct Observation {
    opponent: usize,
    score: f64,
    weight: f64,
}

/// Chronological anchors of one player plus the prior variances between them
#[derive(Debug, Clone)]
struct PlayerTrack {
    player_id: PlayerId,
    anchors: Vec<usize>,
    variances: Vec<f64>,
}

#[derive(Debug, Clone)]
struct GameEntry {
    game_id: GameId,
    played_at: DateTime<Utc>,
    anchors: Vec<usize>,
}

/// Sparse history: anchors in an arena, referenced by player and by game
#[derive(Debug, Clone, Default)]
struct HistoryGraph {
    anchors: Vec<Anchor>,
    players: Vec<PlayerTrack>,
    games: Vec<GameEntry>,
}

impl HistoryGraph {
    fn build(games: &[WhrGame], config: &WhrConfig) -> Result<Self> {
        let mut seen_games = HashSet::new();
        for game in games {
            if !seen_games.insert(game.game_id) {
                return Err(RatingError::invalid_input(format!(
                    "Game {} appears more than once in the history",
                    game.game_id
                ))
                .into());
            }
        }

        let mut ordered: Vec<&WhrGame> = games.iter().collect();
        ordered.sort_by(|a, b| {
            a.played_at
                .cmp(&b.played_at)
                .then_with(|| a.game_id.cmp(&b.game_id))
        });

        let mut graph = HistoryGraph::default();
        let mut player_index: BTreeMap<PlayerId, Vec<usize>> = BTreeMap::new();

        for game in ordered {
            let ranking = normalize(&game.players)?;
            if ranking.len() < 2 {
                warn!(
                    game_id = %game.game_id,
                    players = ranking.len(),
                    "Skipping game with fewer than two players"
                );
                continue;
            }

            let game_index = graph.games.len();
            let first_anchor = graph.anchors.len();
            let opponents = (ranking.len() - 1) as f64;

            for (offset, entry) in ranking.iter().enumerate() {
                let observations = ranking
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != offset)
                    .map(|(other, opponent)| Observation {
                        opponent: first_anchor + other,
                        score: compare_positions(
                            entry.normalized_position,
                            opponent.normalized_position,
                        )
                        .score(),
                        weight: 1.0 / opponents,
                    })
                    .collect();

                graph.anchors.push(Anchor {
                    game: game_index,
                    rating: 0.0,
                    observations,
                });
                player_index
                    .entry(entry.player_id.clone())
                    .or_default()
                    .push(first_anchor + offset);
            }

            graph.games.push(GameEntry {
                game_id: game.game_id,
                played_at: game.played_at,
                anchors: (first_anchor..first_anchor + ranking.len()).collect(),
            });
        }

        for (player_id, anchors) in player_index {
            let variances = anchors
                .windows(2)
                .map(|pair| {
                    let earlier = graph.games[graph.anchors[pair[0]].game].played_at;
                    let later = graph.games[graph.anchors[pair[1]].game].played_at;
                    config.transition_variance(days_between(earlier, later))
                })
                .collect();

            graph.players.push(PlayerTrack {
                player_id,
                anchors,
                variances,
            });
        }

        Ok(graph)
    }

    /// One Newton step over a player's whole track. Returns the largest
    /// movement in Elo points.
    fn newton_step(&mut self, player: usize, virtual_games: f64) -> Result<f64> {
        let track = &self.players[player];
        let n = track.anchors.len();

        let mut gradient = vec![0.0; n];
        let mut diagonal = vec![0.0; n];
        let mut off_diagonal = vec![0.0; n.saturating_sub(1)];

        for (t, &anchor_index) in track.anchors.iter().enumerate() {
            let anchor = &self.anchors[anchor_index];
            let rating = anchor.rating;

            for observation in &anchor.observations {
                let opponent = self.anchors[observation.opponent].rating;
                let p = win_probability(rating, opponent);
                gradient[t] += observation.weight * (observation.score - p);
                diagonal[t] -= observation.weight * p * (1.0 - p);
            }

            if t == 0 {
                let p = win_probability(rating, 0.0);
                gradient[t] += virtual_games * (0.5 - p);
                diagonal[t] -= virtual_games * p * (1.0 - p);
            }
        }

        for (t, variance) in track.variances.iter().enumerate() {
            let diff =
                self.anchors[track.anchors[t + 1]].rating - self.anchors[track.anchors[t]].rating;
            gradient[t] += diff / variance;
            gradient[t + 1] -= diff / variance;
            diagonal[t] -= 1.0 / variance;
            diagonal[t + 1] -= 1.0 / variance;
            off_diagonal[t] += 1.0 / variance;
        }

        let mut step = solve_tridiagonal(&diagonal, &off_diagonal, &gradient);
        let largest = step.iter().fold(0.0_f64, |acc, delta| acc.max(delta.abs()));
        if largest > MAX_NEWTON_STEP {
            let shrink = MAX_NEWTON_STEP / largest;
            step.iter_mut().for_each(|delta| *delta *= shrink);
        }

        let mut max_change: f64 = 0.0;
        for (&anchor_index, delta) in track.anchors.iter().zip(&step) {
            if !delta.is_finite() {
                return Err(RatingError::ConvergenceFailure {
                    iterations: 0,
                    max_change: f64::INFINITY,
                }
                .into());
            }
            self.anchors[anchor_index].rating -= delta;
            max_change = max_change.max(delta.abs() * ELO_PER_NATURAL);
        }

        Ok(max_change)
    }
}

/// Probability that a player rated `rating` beats one rated `opponent`
fn win_probability(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + (opponent - rating).exp())
}

/// Solve `H x = g` for a symmetric tridiagonal `H` (Thomas algorithm).
/// `off_diagonal[i]` couples rows `i` and `i + 1`.
fn solve_tridiagonal(diagonal: &[f64], off_diagonal: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = diagonal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut upper = vec![0.0; n];
    let mut reduced = vec![0.0; n];

    let mut pivot = diagonal[0];
    if n > 1 {
        upper[0] = off_diagonal[0] / pivot;
    }
    reduced[0] = rhs[0] / pivot;

    for i in 1..n {
        pivot = diagonal[i] - off_diagonal[i - 1] * upper[i - 1];
        if i < n - 1 {
            upper[i] = off_diagonal[i] / pivot;
        }
        reduced[i] = (rhs[i] - off_diagonal[i - 1] * reduced[i - 1]) / pivot;
    }

    let mut solution = reduced;
    for i in (0..n - 1).rev() {
        solution[i] -= upper[i] * solution[i + 1];
    }
    solution
}

/// Batch whole-history rating engine
#[derive(Debug, Clone)]
pub struct WhrEngine {
    config: WhrConfig,
}

impl WhrEngine {
    /// Create a new engine, rejecting invalid configuration
    pub fn new(config: WhrConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &WhrConfig {
        &self.config
    }

    /// Rate the complete history. Games may be passed in any order; they are
    /// processed by `played_at`, then by id.
    pub fn compute(&self, games: &[WhrGame]) -> Result<WhrResult> {
        let mut graph = HistoryGraph::build(games, &self.config)?;

        if graph.anchors.is_empty() {
            return Ok(WhrResult::default());
        }

        let mut iterations = 0;
        let mut max_change = f64::INFINITY;

        while max_change >= self.config.convergence_tolerance {
            if iterations == self.config.max_iterations {
                warn!(
                    iterations,
                    max_change, "WHR stopped before reaching the convergence tolerance"
                );
                return Err(RatingError::ConvergenceFailure {
                    iterations,
                    max_change,
                }
                .into());
            }

            max_change = 0.0;
            for player in 0..graph.players.len() {
                let moved = graph
                    .newton_step(player, self.config.virtual_games)
                    .map_err(|_| RatingError::ConvergenceFailure {
                        iterations: iterations + 1,
                        max_change: f64::INFINITY,
                    })?;
                max_change = max_change.max(moved);
            }
            iterations += 1;
            debug!(iterations, max_change, "WHR sweep");
        }

        info!(
            games = graph.games.len(),
            players = graph.players.len(),
            iterations,
            "WHR converged"
        );

        Ok(self.collect(&graph, iterations, max_change))
    }

    fn collect(&self, graph: &HistoryGraph, iterations: usize, max_change: f64) -> WhrResult {
        let mut result = WhrResult {
            iterations,
            max_change,
            ..Default::default()
        };

        for game in &graph.games {
            result
                .game_snapshots
                .insert(game.game_id, HashMap::with_capacity(game.anchors.len()));
            result
                .game_changes
                .insert(game.game_id, HashMap::with_capacity(game.anchors.len()));
        }

        for track in &graph.players {
            let mut previous: Option<f64> = None;

            for &anchor_index in &track.anchors {
                let anchor = &graph.anchors[anchor_index];
                let game_id = graph.games[anchor.game].game_id;
                let snapshot = self.config.to_display(anchor.rating);
                let change = previous.map_or(0.0, |prev| snapshot - prev);

                if let Some(snapshots) = result.game_snapshots.get_mut(&game_id) {
                    snapshots.insert(track.player_id.clone(), snapshot);
                }
                if let Some(changes) = result.game_changes.get_mut(&game_id) {
                    changes.insert(track.player_id.clone(), change);
                }
                previous = Some(snapshot);
            }

            if let Some(latest) = previous {
                result.player_ratings.insert(track.player_id.clone(), latest);
            }
        }

        result
    }
}

impl Default for WhrEngine {
    fn default() -> Self {
        Self {
            config: WhrConfig::default(),
        }
    }
}
