//! Pairwise comparison outcomes derived from normalized positions
//!
//! Every rating system in this crate reads ties the same way: equal normalized
//! positions are a draw. Lower positions are better.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Result of one player against another, from the first player's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PairwiseOutcome {
    Win,
    Draw,
    Loss,
}

impl PairwiseOutcome {
    /// Actual score used by Elo and WHR
    pub fn score(self) -> f64 {
        match self {
            PairwiseOutcome::Win => 1.0,
            PairwiseOutcome::Draw => 0.5,
            PairwiseOutcome::Loss => 0.0,
        }
    }

    /// Same comparison seen from the opponent's side
    pub fn reversed(self) -> Self {
        match self {
            PairwiseOutcome::Win => PairwiseOutcome::Loss,
            PairwiseOutcome::Draw => PairwiseOutcome::Draw,
            PairwiseOutcome::Loss => PairwiseOutcome::Win,
        }
    }
}

/// Compare two normalized positions
pub fn compare_positions(position: f64, opponent_position: f64) -> PairwiseOutcome {
    match position.partial_cmp(&opponent_position) {
        Some(Ordering::Less) => PairwiseOutcome::Win,
        Some(Ordering::Greater) => PairwiseOutcome::Loss,
        _ => PairwiseOutcome::Draw,
    }
}

/// Ordering for sorting by position, best first
pub fn position_order(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Dense ranks for a list of positions: each rank is one plus the number of
/// distinct strictly better positions, so tied positions share a rank.
pub fn dense_ranks(positions: &[f64]) -> Vec<usize> {
    let mut distinct: Vec<f64> = positions.to_vec();
    distinct.sort_by(|a, b| position_order(*a, *b));
    distinct.dedup();

    positions
        .iter()
        .map(|position| {
            1 + distinct
                .iter()
                .take_while(|other| compare_positions(**other, *position) == PairwiseOutcome::Win)
                .count()
        })
        .collect()
}
