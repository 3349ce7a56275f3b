//! Rating computation engine
//!
//! This module provides rank normalization and the three rating systems fed
//! by it: multiplayer Elo, OpenSkill (Weng-Lin) and Whole-History Rating.

pub mod elo;
pub mod normalizer;
pub mod openskill;
pub mod outcome;
pub mod whr;

// Re-export commonly used types
pub use elo::{EloConfig, EloUpdater, KFactorTier};
pub use normalizer::normalize;
pub use openskill::{OpenSkillConfig, OpenSkillModel, OpenSkillUpdater};
pub use outcome::{compare_positions, dense_ranks, PairwiseOutcome};
pub use whr::{WhrConfig, WhrEngine};

use crate::error::Result;
use crate::types::{
    EloChange, EloParticipant, OpenSkillChange, OpenSkillParticipant, WhrGame, WhrResult,
};

/// Elo update with the default K-factor schedule
pub fn elo_update(participants: &[EloParticipant]) -> Result<Vec<EloChange>> {
    EloUpdater::default().update(participants)
}

/// OpenSkill update with the default Plackett-Luce configuration
pub fn openskill_update(participants: &[OpenSkillParticipant]) -> Result<Vec<OpenSkillChange>> {
    OpenSkillUpdater::default().update(participants)
}

/// Whole-history ratings with the default configuration
pub fn compute_whr(games: &[WhrGame]) -> Result<WhrResult> {
    WhrEngine::default().compute(games)
}
