//! Rating service: player registration and incremental game submission
//!
//! A submitted game runs normalize, Elo and OpenSkill in that order for the
//! single new game and is stored with one `commit_game` call, so either every
//! rating system sees the game or none does. WHR columns of the new results
//! carry each player's current WHR rating until the next full recomputation.

use crate::config::RatingConfig;
use crate::error::{RatingError, Result};
use crate::metrics::MetricsCollector;
use crate::rating::normalizer::normalize;
use crate::rating::{EloUpdater, OpenSkillUpdater, WhrEngine};
use crate::service::locks::PlayerLocks;
use crate::stats::{self, HeadToHead, LeaderboardEntry, PlayerProfile, RatingKind};
use crate::storage::{GameCommit, GameStore};
use crate::types::{
    EloParticipant, Game, GameResult, OpenSkillParticipant, Player, PlayerId, RawRanking,
};
use crate::utils::{current_timestamp, generate_game_id, generate_result_id, player_id_from_name};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// What a successful submission stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSubmission {
    pub game: Game,
    /// Sorted by normalized position
    pub results: Vec<GameResult>,
    pub players: Vec<Player>,
}

/// Entry point for everything that changes ratings
pub struct RatingService {
    pub(crate) store: Arc<dyn GameStore>,
    pub(crate) config: RatingConfig,
    pub(crate) elo: EloUpdater,
    pub(crate) openskill: OpenSkillUpdater,
    pub(crate) whr: WhrEngine,
    pub(crate) metrics: Arc<MetricsCollector>,
    player_locks: PlayerLocks,
    /// Submissions hold this shared; a full recomputation holds it exclusively
    pub(crate) history_lock: RwLock<()>,
}

impl RatingService {
    /// Create a new service with its own metrics collector
    pub fn new(store: Arc<dyn GameStore>, config: RatingConfig) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new()?);
        Self::with_metrics(store, config, metrics)
    }

    /// Create a new service reporting into the given metrics collector
    pub fn with_metrics(
        store: Arc<dyn GameStore>,
        config: RatingConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            store,
            elo: EloUpdater::new(config.elo.clone())?,
            openskill: OpenSkillUpdater::new(config.openskill.clone())?,
            whr: WhrEngine::new(config.whr.clone())?,
            config,
            metrics,
            player_locks: PlayerLocks::new(),
            history_lock: RwLock::new(()),
        })
    }

    pub fn store(&self) -> Arc<dyn GameStore> {
        self.store.clone()
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// A never-rated player with every system at its initial value
    pub fn new_player(&self, id: PlayerId, name: String) -> Player {
        let belief = self.config.openskill.initial_belief();
        Player {
            id,
            name,
            elo: self.config.elo.initial_rating,
            games_played: 0,
            os_mu: belief.mu,
            os_sigma: belief.sigma,
            os_ordinal: self.config.openskill.display_ordinal(belief),
            whr_rating: self.config.whr.display_offset,
            created_at: current_timestamp(),
        }
    }

    /// Register a player; the id is derived from the name
    pub async fn register_player(&self, name: &str) -> Result<Player> {
        let id = player_id_from_name(name);
        if id.is_empty() {
            return Err(RatingError::invalid_input("Player name cannot be empty").into());
        }

        let player = self.new_player(id, name.trim().to_string());
        self.store.insert_player(player.clone()).await?;
        self.metrics.record_player_registered();

        info!(player_id = %player.id, "Registered player");
        Ok(player)
    }

    /// Rate and store one new game. Nothing is persisted if any step fails.
    pub async fn submit_game(
        &self,
        played_at: DateTime<Utc>,
        raw_rankings: &[RawRanking],
    ) -> Result<GameSubmission> {
        let timer = self.metrics.start_timer();

        match self.rate_and_commit(played_at, raw_rankings).await {
            Ok(submission) => {
                self.metrics
                    .record_submission(submission.results.len(), timer.stop());
                info!(
                    game_id = %submission.game.id,
                    players = submission.results.len(),
                    "Recorded game"
                );
                Ok(submission)
            }
            Err(e) => {
                self.metrics.record_rejected_submission();
                warn!("Game submission rejected: {}", e);
                Err(e)
            }
        }
    }

    /// Rate a game against the current ratings without storing anything
    pub async fn preview_game(
        &self,
        played_at: DateTime<Utc>,
        raw_rankings: &[RawRanking],
    ) -> Result<GameSubmission> {
        let _history = self.history_lock.read().await;
        self.rate_game(played_at, raw_rankings).await
    }

    /// Current standings by the chosen rating
    pub async fn leaderboard(&self, by: RatingKind) -> Result<Vec<LeaderboardEntry>> {
        let players = self.store.list_players().await?;
        Ok(stats::leaderboard(&players, by))
    }

    pub async fn player_profile(&self, player_id: &PlayerId) -> Result<PlayerProfile> {
        let player = self
            .store
            .get_player(player_id)
            .await?
            .ok_or_else(|| RatingError::invalid_input(format!("Unknown player {}", player_id)))?;
        let games = self.store.list_games().await?;
        let results = self.store.list_results().await?;

        stats::player_profile(&player, &games, &results)
    }

    pub async fn head_to_head(&self) -> Result<HeadToHead> {
        let players = self.store.list_players().await?;
        let results = self.store.list_results().await?;
        Ok(stats::head_to_head(&players, &results))
    }

    async fn rate_and_commit(
        &self,
        played_at: DateTime<Utc>,
        raw_rankings: &[RawRanking],
    ) -> Result<GameSubmission> {
        let player_ids: Vec<PlayerId> = raw_rankings.iter().map(|r| r.player_id.clone()).collect();

        let _history = self.history_lock.read().await;
        let _locks = self.player_locks.lock_all(&player_ids).await?;

        let submission = self.rate_game(played_at, raw_rankings).await?;

        self.store
            .commit_game(GameCommit {
                game: submission.game.clone(),
                results: submission.results.clone(),
                players: submission.players.clone(),
            })
            .await?;

        Ok(submission)
    }

    async fn rate_game(
        &self,
        played_at: DateTime<Utc>,
        raw_rankings: &[RawRanking],
    ) -> Result<GameSubmission> {
        let ranking = normalize(raw_rankings)?;
        if ranking.len() < 2 {
            return Err(RatingError::invalid_input(format!(
                "A game needs at least two distinct players, got {}",
                ranking.len()
            ))
            .into());
        }

        let player_ids: Vec<PlayerId> = ranking.iter().map(|r| r.player_id.clone()).collect();
        let current = self.store.get_players(&player_ids).await?;
        let mut players = Vec::with_capacity(ranking.len());
        for entry in &ranking {
            let player = current.get(&entry.player_id).cloned().ok_or_else(|| {
                RatingError::inconsistent_state(format!("Unknown player {}", entry.player_id))
            })?;
            players.push(player);
        }

        let elo_changes = self.elo.update(
            &ranking
                .iter()
                .zip(&players)
                .map(|(entry, player)| EloParticipant {
                    player_id: player.id.clone(),
                    elo: player.elo,
                    games_played: player.games_played,
                    normalized_position: entry.normalized_position,
                })
                .collect::<Vec<_>>(),
        )?;

        let os_changes = self.openskill.update(
            &ranking
                .iter()
                .zip(&players)
                .map(|(entry, player)| OpenSkillParticipant {
                    player_id: player.id.clone(),
                    mu: player.os_mu,
                    sigma: player.os_sigma,
                    normalized_position: entry.normalized_position,
                })
                .collect::<Vec<_>>(),
        )?;

        let game = Game {
            id: generate_game_id(),
            played_at,
            total_players: raw_rankings.len() as u32,
        };

        let mut results = Vec::with_capacity(ranking.len());
        let mut updated_players = Vec::with_capacity(ranking.len());

        for (((entry, player), elo), os) in ranking
            .into_iter()
            .zip(players)
            .zip(elo_changes)
            .zip(os_changes)
        {
            debug!(
                player_id = %player.id,
                elo_change = elo.change,
                os_change = os.ordinal_change,
                "Rated participant"
            );

            results.push(GameResult {
                id: generate_result_id(),
                game_id: game.id,
                player_id: player.id.clone(),
                raw_positions: entry.raw_positions,
                normalized_position: entry.normalized_position,
                elo_before: elo.elo_before,
                elo_after: elo.elo_after,
                elo_change: elo.change,
                os_before: os.ordinal_before,
                os_after: os.ordinal_after,
                os_change: os.ordinal_change,
                whr_before: player.whr_rating,
                whr_after: player.whr_rating,
                whr_change: 0.0,
            });

            updated_players.push(Player {
                elo: elo.elo_after,
                games_played: elo.games_played_after,
                os_mu: os.mu_after,
                os_sigma: os.sigma_after,
                os_ordinal: os.ordinal_after,
                ..player
            });
        }

        Ok(GameSubmission {
            game,
            results,
            players: updated_players,
        })
    }
}
