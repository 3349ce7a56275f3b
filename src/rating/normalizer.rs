//! Rank normalization
//!
//! Collapses raw per-occurrence finishing positions into one position per player.
//! A player who was knocked out and rejoined the same session appears several
//! times in the raw input; their normalized position is the mean of those
//! occurrences.

use crate::error::{RatingError, Result};
use crate::rating::outcome::position_order;
use crate::types::{NormalizedRanking, PlayerId, RawRanking};
use std::collections::BTreeMap;

/// Normalize the raw rankings of one game.
///
/// The result holds one entry per distinct player, sorted ascending by
/// normalized position. Ties are kept as ties; among tied players the order is
/// by player id so the output never depends on input order.
pub fn normalize(raw_rankings: &[RawRanking]) -> Result<Vec<NormalizedRanking>> {
    let mut grouped: BTreeMap<&PlayerId, Vec<f64>> = BTreeMap::new();

    for ranking in raw_rankings {
        validate_position(ranking)?;
        grouped
            .entry(&ranking.player_id)
            .or_default()
            .push(ranking.position);
    }

    let mut normalized: Vec<NormalizedRanking> = grouped
        .into_iter()
        .map(|(player_id, mut positions)| {
            positions.sort_by(|a, b| position_order(*a, *b));
            let sum: f64 = positions.iter().sum();
            NormalizedRanking {
                player_id: player_id.clone(),
                normalized_position: sum / positions.len() as f64,
                raw_positions: positions,
            }
        })
        .collect();

    // Stable sort keeps the id order from the BTreeMap among tied players
    normalized.sort_by(|a, b| position_order(a.normalized_position, b.normalized_position));

    Ok(normalized)
}

fn validate_position(ranking: &RawRanking) -> Result<()> {
    if ranking.player_id.trim().is_empty() {
        return Err(RatingError::invalid_input("Raw ranking has an empty player id").into());
    }
    if !ranking.position.is_finite() || ranking.position < 0.0 {
        return Err(RatingError::invalid_input(format!(
            "Invalid position {} for player {}",
            ranking.position, ranking.player_id
        ))
        .into());
    }
    Ok(())
}
