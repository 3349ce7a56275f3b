//! Card Ladder - Rating engine for multiplayer card game sessions
//!
//! This crate turns each session's finishing order into updates of three
//! rating systems: multiplayer Elo, OpenSkill (Weng-Lin) and Whole-History
//! Rating, with incremental submission and full history recomputation.

pub mod config;
pub mod error;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod stats;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RatingError, Result};
pub use types::*;

// Re-export key components
pub use rating::{compute_whr, elo_update, normalize, openskill_update};
pub use service::{GameSubmission, RatingService, RecomputeReport};
pub use storage::{GameStore, InMemoryGameStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
