//! Game storage interface and implementations
//!
//! The rating engine reads and writes players, games and results only through
//! the [`GameStore`] trait. Every write that touches ratings is a single call so
//! an implementation can make it atomic.

use crate::error::{RatingError, Result};
use crate::types::{Game, GameId, GameResult, Player, PlayerId};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;
use tracing::debug;

/// Everything written when one new game is recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCommit {
    pub game: Game,
    pub results: Vec<GameResult>,
    /// Participants with their post-game rating fields
    pub players: Vec<Player>,
}

/// Trait for game history storage operations
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Get a single player
    async fn get_player(&self, player_id: &PlayerId) -> Result<Option<Player>>;

    /// Get several players; unknown ids are absent from the map
    async fn get_players(&self, player_ids: &[PlayerId]) -> Result<HashMap<PlayerId, Player>>;

    /// All players ordered by id
    async fn list_players(&self) -> Result<Vec<Player>>;

    /// Register a new player. Fails if the id is taken.
    async fn insert_player(&self, player: Player) -> Result<()>;

    /// All games ordered by `played_at`, then id
    async fn list_games(&self) -> Result<Vec<Game>>;

    /// Every stored game result
    async fn list_results(&self) -> Result<Vec<GameResult>>;

    /// Results of one game
    async fn results_for_game(&self, game_id: &GameId) -> Result<Vec<GameResult>>;

    /// Results of one player, oldest game first
    async fn results_for_player(&self, player_id: &PlayerId) -> Result<Vec<GameResult>>;

    /// Store a new game with its results and updated players, all or nothing
    async fn commit_game(&self, commit: GameCommit) -> Result<()>;

    /// Overwrite the rating columns of existing results and players, all or nothing
    async fn replace_ratings(&self, results: Vec<GameResult>, players: Vec<Player>) -> Result<()>;
}

/// Serializable content of a store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub players: Vec<Player>,
    pub games: Vec<Game>,
    pub results: Vec<GameResult>,
}

#[derive(Debug, Default)]
struct StoreState {
    players: BTreeMap<PlayerId, Player>,
    games: HashMap<GameId, Game>,
    results: Vec<GameResult>,
}

impl StoreState {
    fn game_order(&self) -> Vec<&Game> {
        let mut games: Vec<&Game> = self.games.values().collect();
        games.sort_by(|a, b| a.played_at.cmp(&b.played_at).then_with(|| a.id.cmp(&b.id)));
        games
    }

    fn check_commit(&self, commit: &GameCommit) -> Result<()> {
        if self.games.contains_key(&commit.game.id) {
            return Err(RatingError::inconsistent_state(format!(
                "Game {} already exists",
                commit.game.id
            ))
            .into());
        }

        let mut seen = HashSet::new();
        for result in &commit.results {
            if result.game_id != commit.game.id {
                return Err(RatingError::inconsistent_state(format!(
                    "Result {} references game {} instead of {}",
                    result.id, result.game_id, commit.game.id
                ))
                .into());
            }
            if !seen.insert(result.player_id.as_str()) {
                return Err(RatingError::inconsistent_state(format!(
                    "Player {} has more than one result in game {}",
                    result.player_id, commit.game.id
                ))
                .into());
            }
            if !self.players.contains_key(&result.player_id) {
                return Err(RatingError::inconsistent_state(format!(
                    "Result references unknown player {}",
                    result.player_id
                ))
                .into());
            }
        }

        for player in &commit.players {
            if !self.players.contains_key(&player.id) {
                return Err(RatingError::inconsistent_state(format!(
                    "Cannot update unknown player {}",
                    player.id
                ))
                .into());
            }
        }

        Ok(())
    }
}

/// In-memory store, optionally loaded from and saved to a JSON snapshot
#[derive(Debug, Default)]
pub struct InMemoryGameStore {
    state: RwLock<StoreState>,
}

impl InMemoryGameStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot, checking referential integrity
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        let mut state = StoreState::default();

        for player in snapshot.players {
            state.players.insert(player.id.clone(), player);
        }
        for game in snapshot.games {
            state.games.insert(game.id, game);
        }

        let mut seen = HashSet::new();
        for result in &snapshot.results {
            if !state.games.contains_key(&result.game_id) {
                return Err(RatingError::inconsistent_state(format!(
                    "Result {} references unknown game {}",
                    result.id, result.game_id
                ))
                .into());
            }
            if !state.players.contains_key(&result.player_id) {
                return Err(RatingError::inconsistent_state(format!(
                    "Result {} references unknown player {}",
                    result.id, result.player_id
                ))
                .into());
            }
            if !seen.insert((result.game_id, result.player_id.clone())) {
                return Err(RatingError::inconsistent_state(format!(
                    "Duplicate result for player {} in game {}",
                    result.player_id, result.game_id
                ))
                .into());
            }
        }
        state.results = snapshot.results;

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Current content as a snapshot, games in chronological order
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        let state = self.read()?;

        Ok(StoreSnapshot {
            players: state.players.values().cloned().collect(),
            games: state.game_order().into_iter().cloned().collect(),
            results: state.results.clone(),
        })
    }

    /// Load a JSON snapshot; a missing file yields an empty store
    pub fn load_json(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No data file at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read data file {}", path.display()))?;
        let snapshot: StoreSnapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse data file {}", path.display()))?;

        Self::from_snapshot(snapshot)
    }

    /// Write the current content as a JSON snapshot
    pub fn save_json(&self, path: &Path, pretty: bool) -> Result<()> {
        let snapshot = self.snapshot()?;
        let contents = if pretty {
            serde_json::to_string_pretty(&snapshot)?
        } else {
            serde_json::to_string(&snapshot)?
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write data file {}", path.display()))?;
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| {
            RatingError::StorageError {
                message: "Failed to acquire store read lock".to_string(),
            }
            .into()
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|_| {
            RatingError::StorageError {
                message: "Failed to acquire store write lock".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    async fn get_player(&self, player_id: &PlayerId) -> Result<Option<Player>> {
        Ok(self.read()?.players.get(player_id).cloned())
    }

    async fn get_players(&self, player_ids: &[PlayerId]) -> Result<HashMap<PlayerId, Player>> {
        let state = self.read()?;

        let mut result = HashMap::new();
        for player_id in player_ids {
            if let Some(player) = state.players.get(player_id) {
                result.insert(player_id.clone(), player.clone());
            }
        }

        Ok(result)
    }

    async fn list_players(&self) -> Result<Vec<Player>> {
        Ok(self.read()?.players.values().cloned().collect())
    }

    async fn insert_player(&self, player: Player) -> Result<()> {
        let mut state = self.write()?;

        if state.players.contains_key(&player.id) {
            return Err(RatingError::invalid_input(format!(
                "Player {} already exists",
                player.id
            ))
            .into());
        }

        state.players.insert(player.id.clone(), player);
        Ok(())
    }

    async fn list_games(&self) -> Result<Vec<Game>> {
        Ok(self.read()?.game_order().into_iter().cloned().collect())
    }

    async fn list_results(&self) -> Result<Vec<GameResult>> {
        Ok(self.read()?.results.clone())
    }

    async fn results_for_game(&self, game_id: &GameId) -> Result<Vec<GameResult>> {
        let state = self.read()?;

        let mut results: Vec<GameResult> = state
            .results
            .iter()
            .filter(|r| &r.game_id == game_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| {
            a.normalized_position
                .partial_cmp(&b.normalized_position)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(results)
    }

    async fn results_for_player(&self, player_id: &PlayerId) -> Result<Vec<GameResult>> {
        let state = self.read()?;

        let order: HashMap<GameId, usize> = state
            .game_order()
            .iter()
            .enumerate()
            .map(|(index, game)| (game.id, index))
            .collect();

        let mut results: Vec<GameResult> = state
            .results
            .iter()
            .filter(|r| &r.player_id == player_id)
            .cloned()
            .collect();
        results.sort_by_key(|r| order.get(&r.game_id).copied().unwrap_or(usize::MAX));

        Ok(results)
    }

    async fn commit_game(&self, commit: GameCommit) -> Result<()> {
        let mut state = self.write()?;

        state.check_commit(&commit)?;

        debug!(
            game_id = %commit.game.id,
            results = commit.results.len(),
            "Committing game"
        );

        for player in commit.players {
            state.players.insert(player.id.clone(), player);
        }
        state.results.extend(commit.results);
        state.games.insert(commit.game.id, commit.game);

        Ok(())
    }

    async fn replace_ratings(&self, results: Vec<GameResult>, players: Vec<Player>) -> Result<()> {
        let mut state = self.write()?;

        let positions: HashMap<(GameId, PlayerId), usize> = state
            .results
            .iter()
            .enumerate()
            .map(|(index, r)| ((r.game_id, r.player_id.clone()), index))
            .collect();

        let mut updates = Vec::with_capacity(results.len());
        for result in results {
            let index = positions
                .get(&(result.game_id, result.player_id.clone()))
                .copied()
                .ok_or_else(|| {
                    RatingError::inconsistent_state(format!(
                        "No stored result for player {} in game {}",
                        result.player_id, result.game_id
                    ))
                })?;
            updates.push((index, result));
        }

        for player in &players {
            if !state.players.contains_key(&player.id) {
                return Err(RatingError::inconsistent_state(format!(
                    "Cannot update unknown player {}",
                    player.id
                ))
                .into());
            }
        }

        for (index, result) in updates {
            state.results[index] = result;
        }
        for player in players {
            state.players.insert(player.id.clone(), player);
        }

        Ok(())
    }
}
