//! Per-player locks for the incremental rating path
//!
//! A submission reads every participant's current ratings, computes new ones
//! and writes them back. Two submissions sharing a player must not interleave
//! those phases, so each holds the locks of all its participants for the whole
//! read-modify-write. Locks are always taken in player id order.

use crate::error::{RatingError, Result};
use crate::types::PlayerId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct PlayerLocks {
    locks: Mutex<HashMap<PlayerId, Arc<AsyncMutex<()>>>>,
}

/// Guards for every player of one submission, released on drop
#[derive(Debug)]
pub struct PlayerLockSet {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl PlayerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock all given players. Duplicates are ignored.
    pub async fn lock_all(&self, player_ids: &[PlayerId]) -> Result<PlayerLockSet> {
        let mut ids: Vec<&PlayerId> = player_ids.iter().collect();
        ids.sort();
        ids.dedup();

        let handles: Vec<Arc<AsyncMutex<()>>> = {
            let mut locks = self.locks.lock().map_err(|_| RatingError::InternalError {
                message: "Failed to acquire player lock table".to_string(),
            })?;
            ids.iter()
                .map(|id| locks.entry((*id).clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.lock_owned().await);
        }

        Ok(PlayerLockSet { _guards: guards })
    }
}
