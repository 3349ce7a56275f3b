//! Service layer for the rating engine
//!
//! `RatingService` owns the store handle and the three configured rating
//! systems. It rates single submitted games and recomputes the whole history.

pub mod locks;
pub mod ratings;
pub mod recompute;

pub use locks::{PlayerLockSet, PlayerLocks};
pub use ratings::{GameSubmission, RatingService};
pub use recompute::{GameFailure, Recomputation, RecomputeReport};
