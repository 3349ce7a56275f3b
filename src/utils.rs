//! Utility functions for the rating engine

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique game ID
pub fn generate_game_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique game result ID
pub fn generate_result_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Elapsed time between two instants in fractional days, never negative
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let seconds = (later - earlier).num_milliseconds() as f64 / 1000.0;
    (seconds / 86_400.0).max(0.0)
}

/// Turn a human player name into a stable identifier
pub fn player_id_from_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}
