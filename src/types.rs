//! Common types used throughout the rating engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillratings::weng_lin::WengLinRating;
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for games
pub type GameId = Uuid;

/// Unique identifier for stored game results
pub type ResultId = Uuid;

/// One raw finishing position. A player who was eliminated and rejoined
/// contributes one entry per occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRanking {
    pub player_id: PlayerId,
    pub position: f64,
}

impl RawRanking {
    pub fn new(player_id: impl Into<PlayerId>, position: f64) -> Self {
        Self {
            player_id: player_id.into(),
            position,
        }
    }
}

/// One entry per distinct player of a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRanking {
    pub player_id: PlayerId,
    pub normalized_position: f64,
    pub raw_positions: Vec<f64>,
}

/// Gaussian skill belief used by OpenSkill
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillBelief {
    pub mu: f64,
    pub sigma: f64,
}

impl Default for SkillBelief {
    fn default() -> Self {
        Self {
            mu: 25.0,
            sigma: 25.0 / 3.0,
        }
    }
}

impl From<WengLinRating> for SkillBelief {
    fn from(rating: WengLinRating) -> Self {
        Self {
            mu: rating.rating,
            sigma: rating.uncertainty,
        }
    }
}

impl From<SkillBelief> for WengLinRating {
    fn from(belief: SkillBelief) -> Self {
        Self {
            rating: belief.mu,
            uncertainty: belief.sigma,
        }
    }
}

/// A registered player together with the current value of every rating system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub elo: f64,
    pub games_played: u32,
    pub os_mu: f64,
    pub os_sigma: f64,
    pub os_ordinal: f64,
    pub whr_rating: f64,
    pub created_at: DateTime<Utc>,
}

/// A played session. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub played_at: DateTime<Utc>,
    /// Number of seats in the session, counting every rejoin occurrence
    pub total_players: u32,
}

/// One row per (game, player)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub id: ResultId,
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub raw_positions: Vec<f64>,
    pub normalized_position: f64,
    pub elo_before: f64,
    pub elo_after: f64,
    pub elo_change: f64,
    pub os_before: f64,
    pub os_after: f64,
    pub os_change: f64,
    pub whr_before: f64,
    pub whr_after: f64,
    pub whr_change: f64,
}

/// Elo input for one participant of the game being processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EloParticipant {
    pub player_id: PlayerId,
    pub elo: f64,
    pub games_played: u32,
    pub normalized_position: f64,
}

/// Elo output for one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EloChange {
    pub player_id: PlayerId,
    pub elo_before: f64,
    pub elo_after: f64,
    pub change: f64,
    pub games_played_after: u32,
}

/// OpenSkill input for one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenSkillParticipant {
    pub player_id: PlayerId,
    pub mu: f64,
    pub sigma: f64,
    pub normalized_position: f64,
}

/// OpenSkill output for one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenSkillChange {
    pub player_id: PlayerId,
    pub rank: usize,
    pub mu_before: f64,
    pub sigma_before: f64,
    pub mu_after: f64,
    pub sigma_after: f64,
    pub ordinal_before: f64,
    pub ordinal_after: f64,
    pub ordinal_change: f64,
}

/// One game of the history handed to the WHR engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhrGame {
    pub game_id: GameId,
    pub played_at: DateTime<Utc>,
    pub players: Vec<RawRanking>,
}

/// Whole-history ratings on the display scale
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhrResult {
    pub game_snapshots: HashMap<GameId, HashMap<PlayerId, f64>>,
    pub game_changes: HashMap<GameId, HashMap<PlayerId, f64>>,
    pub player_ratings: HashMap<PlayerId, f64>,
    /// Newton sweeps performed before convergence
    pub iterations: usize,
    /// Largest rating movement (Elo units) in the final sweep
    pub max_change: f64,
}
