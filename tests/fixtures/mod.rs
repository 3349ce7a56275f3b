//! Test fixtures and store wrappers for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use card_ladder::config::RatingConfig;
use card_ladder::error::{RatingError, Result};
use card_ladder::storage::{GameCommit, GameStore, InMemoryGameStore};
use card_ladder::types::{Game, GameId, GameResult, Player, PlayerId, RawRanking};
use card_ladder::RatingService;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Raw rankings from `(player, position)` pairs
pub fn raw(entries: &[(&str, f64)]) -> Vec<RawRanking> {
    entries
        .iter()
        .map(|(id, position)| RawRanking::new(*id, *position))
        .collect()
}

pub fn season_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 6, 19, 30, 0).unwrap()
}

/// Five players over a few weeks, including rejoins and shared positions
pub fn sample_season() -> Vec<(DateTime<Utc>, Vec<RawRanking>)> {
    let start = season_start();
    vec![
        (
            start,
            raw(&[("ana", 1.0), ("ben", 2.0), ("cho", 3.0), ("dev", 4.0)]),
        ),
        (
            start + Duration::hours(2),
            raw(&[
                ("ben", 1.0),
                ("ana", 2.0),
                ("eli", 3.0),
                ("eli", 5.0),
                ("cho", 4.0),
            ]),
        ),
        (
            start + Duration::days(7),
            raw(&[("ana", 1.0), ("dev", 1.0), ("cho", 3.0)]),
        ),
        (
            start + Duration::days(14),
            raw(&[("cho", 1.0), ("eli", 2.0), ("ana", 3.0), ("ben", 4.0), ("dev", 5.0)]),
        ),
        (
            start + Duration::days(21),
            raw(&[("ana", 1.0), ("ben", 2.0)]),
        ),
    ]
}

pub const SEASON_PLAYERS: [&str; 5] = ["ana", "ben", "cho", "dev", "eli"];

/// Service over a fresh in-memory store with the given players registered
pub async fn service_with_players(
    config: RatingConfig,
    names: &[&str],
) -> (Arc<InMemoryGameStore>, RatingService) {
    let store = Arc::new(InMemoryGameStore::new());
    let service = RatingService::new(store.clone(), config).unwrap();
    for name in names {
        service.register_player(name).await.unwrap();
    }
    (store, service)
}

/// Submit every game of `season` in order
pub async fn play(service: &RatingService, season: &[(DateTime<Utc>, Vec<RawRanking>)]) {
    for (played_at, rankings) in season {
        service.submit_game(*played_at, rankings).await.unwrap();
    }
}

/// Store that delegates to an in-memory store and can be told to fail writes
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: InMemoryGameStore,
    fail_writes: AtomicBool,
    commits: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryGameStore {
        &self.inner
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RatingError::StorageError {
                message: "write rejected by test store".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl GameStore for FlakyStore {
    async fn get_player(&self, player_id: &PlayerId) -> Result<Option<Player>> {
        self.inner.get_player(player_id).await
    }

    async fn get_players(&self, player_ids: &[PlayerId]) -> Result<HashMap<PlayerId, Player>> {
        self.inner.get_players(player_ids).await
    }

    async fn list_players(&self) -> Result<Vec<Player>> {
        self.inner.list_players().await
    }

    async fn insert_player(&self, player: Player) -> Result<()> {
        self.inner.insert_player(player).await
    }

    async fn list_games(&self) -> Result<Vec<Game>> {
        self.inner.list_games().await
    }

    async fn list_results(&self) -> Result<Vec<GameResult>> {
        self.inner.list_results().await
    }

    async fn results_for_game(&self, game_id: &GameId) -> Result<Vec<GameResult>> {
        self.inner.results_for_game(game_id).await
    }

    async fn results_for_player(&self, player_id: &PlayerId) -> Result<Vec<GameResult>> {
        self.inner.results_for_player(player_id).await
    }

    async fn commit_game(&self, commit: GameCommit) -> Result<()> {
        self.check_writable()?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit_game(commit).await
    }

    async fn replace_ratings(&self, results: Vec<GameResult>, players: Vec<Player>) -> Result<()> {
        self.check_writable()?;
        self.inner.replace_ratings(results, players).await
    }
}
