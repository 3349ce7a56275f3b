//! Full history recomputation
//!
//! Replays every stored game in chronological order from initial ratings,
//! running Elo and OpenSkill game by game and WHR once over the whole history.
//! Nothing is written until the replay has finished; the new rows and player
//! ratings are then stored with a single `replace_ratings` call.

use crate::error::{rating_error, RatingError, Result};
use crate::rating::normalizer::normalize;
use crate::service::ratings::RatingService;
use crate::types::{
    EloChange, EloParticipant, GameId, GameResult, NormalizedRanking, OpenSkillChange,
    OpenSkillParticipant, Player, PlayerId, RawRanking, WhrGame, WhrResult,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info, warn};

/// A game the replay could not rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameFailure {
    pub game_id: GameId,
    pub reason: String,
}

/// Summary of one recomputation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecomputeReport {
    /// Games rated by Elo and OpenSkill
    pub games_processed: usize,
    /// Games with fewer than two distinct players
    pub skipped_games: Vec<GameId>,
    pub failed_games: Vec<GameFailure>,
    /// Sweeps WHR needed, if it converged
    pub whr_iterations: Option<usize>,
    pub whr_converged: bool,
    /// False when any game failed or WHR did not converge
    pub complete: bool,
}

/// Everything a recomputation would write
#[derive(Debug, Clone)]
pub struct Recomputation {
    pub report: RecomputeReport,
    pub results: Vec<GameResult>,
    pub players: Vec<Player>,
}

struct RatedGame {
    ranking: Vec<NormalizedRanking>,
    elo: Vec<EloChange>,
    openskill: Vec<OpenSkillChange>,
}

enum Replayed {
    Rated(RatedGame),
    Skipped,
    Failed(String),
}

type PlayerState = BTreeMap<PlayerId, Player>;

impl RatingService {
    /// Recompute every rating from the complete history and store the outcome.
    ///
    /// Holds the history lock exclusively, so no submission runs in between.
    pub async fn recompute_all(&self) -> Result<RecomputeReport> {
        let _history = self.history_lock.write().await;
        let started = self.metrics.start_timer();

        let recomputation = self.replay().await?;

        let timer = self.metrics.start_timer();
        self.store
            .replace_ratings(recomputation.results, recomputation.players)
            .await?;
        self.metrics.record_phase("persist", timer.stop());

        let report = recomputation.report;
        self.metrics.record_recomputation(report.complete);
        info!(
            games = report.games_processed,
            skipped = report.skipped_games.len(),
            failed = report.failed_games.len(),
            complete = report.complete,
            elapsed_ms = started.stop().as_millis() as u64,
            "Recomputed rating history"
        );

        Ok(report)
    }

    /// Run a recomputation without storing anything
    pub async fn preview_recompute(&self) -> Result<Recomputation> {
        let _history = self.history_lock.read().await;
        self.replay().await
    }

    async fn replay(&self) -> Result<Recomputation> {
        let games = self.store.list_games().await?;
        let stored_players = self.store.list_players().await?;

        let mut rows_by_game: HashMap<GameId, Vec<GameResult>> = HashMap::new();
        for result in self.store.list_results().await? {
            rows_by_game.entry(result.game_id).or_default().push(result);
        }

        let mut state: PlayerState = stored_players
            .iter()
            .map(|p| {
                let mut fresh = self.new_player(p.id.clone(), p.name.clone());
                fresh.created_at = p.created_at;
                (p.id.clone(), fresh)
            })
            .collect();

        let mut report = RecomputeReport::default();
        let mut results = Vec::new();
        let mut whr_games = Vec::new();

        info!(games = games.len(), players = state.len(), "Replaying history");
        let timer = self.metrics.start_timer();

        for game in &games {
            let rows = rows_by_game.remove(&game.id).unwrap_or_default();

            match self.replay_game(&rows, &mut state) {
                Replayed::Rated(rated) => {
                    debug!(game_id = %game.id, players = rated.ranking.len(), "Replayed game");
                    report.games_processed += 1;
                    self.metrics.record_replayed_game("rated");

                    whr_games.push(WhrGame {
                        game_id: game.id,
                        played_at: game.played_at,
                        players: raw_rankings(&rows),
                    });
                    results.extend(rated_rows(rows, &rated));
                }
                Replayed::Skipped => {
                    warn!(game_id = %game.id, "Skipping game with fewer than two players");
                    report.skipped_games.push(game.id);
                    self.metrics.record_replayed_game("skipped");
                    results.extend(rows.into_iter().map(|row| neutral_row(row, &state)));
                }
                Replayed::Failed(reason) => {
                    error!(game_id = %game.id, "Failed to rate game: {}", reason);
                    report.failed_games.push(GameFailure {
                        game_id: game.id,
                        reason,
                    });
                    self.metrics.record_replayed_game("failed");
                    results.extend(rows.into_iter().map(|row| neutral_row(row, &state)));
                }
            }
        }

        if !rows_by_game.is_empty() {
            return Err(RatingError::inconsistent_state(format!(
                "Results reference {} games that do not exist",
                rows_by_game.len()
            ))
            .into());
        }
        self.metrics.record_phase("replay", timer.stop());

        let timer = self.metrics.start_timer();
        match self.whr.compute(&whr_games) {
            Ok(whr) => {
                report.whr_converged = true;
                report.whr_iterations = Some(whr.iterations);
                self.metrics.record_whr_run(Some(whr.iterations));
                self.apply_whr(&whr, &mut results, &mut state);
            }
            Err(e) => {
                match rating_error(&e) {
                    Some(RatingError::ConvergenceFailure {
                        iterations,
                        max_change,
                    }) => error!(
                        iterations,
                        max_change, "WHR did not converge, keeping stored WHR ratings"
                    ),
                    _ => error!("WHR failed, keeping stored WHR ratings: {}", e),
                }
                self.metrics.record_whr_run(None);

                for stored in &stored_players {
                    if let Some(player) = state.get_mut(&stored.id) {
                        player.whr_rating = stored.whr_rating;
                    }
                }
            }
        }
        self.metrics.record_phase("whr", timer.stop());

        report.complete = report.whr_converged && report.failed_games.is_empty();

        Ok(Recomputation {
            report,
            results,
            players: state.into_values().collect(),
        })
    }

    /// Rate one game from the replay state and advance that state
    fn replay_game(&self, rows: &[GameResult], state: &mut PlayerState) -> Replayed {
        let ranking = match normalize(&raw_rankings(rows)) {
            Ok(ranking) => ranking,
            Err(e) => return Replayed::Failed(e.to_string()),
        };
        if ranking.len() < 2 {
            return Replayed::Skipped;
        }

        let mut players = Vec::with_capacity(ranking.len());
        for entry in &ranking {
            match state.get(&entry.player_id) {
                Some(player) => players.push(player),
                None => return Replayed::Failed(format!("Unknown player {}", entry.player_id)),
            }
        }

        let elo = self.elo.update(
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
        );
        let openskill = self.openskill.update(
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
        );

        // Both systems must succeed before either touches the state
        let (elo, openskill) = match (elo, openskill) {
            (Ok(elo), Ok(openskill)) => (elo, openskill),
            (Err(e), _) | (_, Err(e)) => return Replayed::Failed(e.to_string()),
        };

        for (elo_change, os_change) in elo.iter().zip(&openskill) {
            if let Some(player) = state.get_mut(&elo_change.player_id) {
                player.elo = elo_change.elo_after;
                player.games_played = elo_change.games_played_after;
                player.os_mu = os_change.mu_after;
                player.os_sigma = os_change.sigma_after;
                player.os_ordinal = os_change.ordinal_after;
            }
        }

        Replayed::Rated(RatedGame {
            ranking,
            elo,
            openskill,
        })
    }

    fn apply_whr(&self, whr: &WhrResult, results: &mut [GameResult], state: &mut PlayerState) {
        let offset = self.whr.config().display_offset;

        for row in results.iter_mut() {
            let snapshot = whr
                .game_snapshots
                .get(&row.game_id)
                .and_then(|game| game.get(&row.player_id))
                .copied();
            let change = whr
                .game_changes
                .get(&row.game_id)
                .and_then(|game| game.get(&row.player_id))
                .copied()
                .unwrap_or(0.0);

            match snapshot {
                Some(after) => {
                    row.whr_before = after - change;
                    row.whr_after = after;
                    row.whr_change = change;
                }
                None => {
                    let current = state
                        .get(&row.player_id)
                        .map(|p| p.whr_rating)
                        .unwrap_or(offset);
                    row.whr_before = current;
                    row.whr_after = current;
                    row.whr_change = 0.0;
                }
            }
        }

        for player in state.values_mut() {
            player.whr_rating = whr
                .player_ratings
                .get(&player.id)
                .copied()
                .unwrap_or(offset);
        }
    }
}

fn raw_rankings(rows: &[GameResult]) -> Vec<RawRanking> {
    rows.iter()
        .flat_map(|row| {
            row.raw_positions
                .iter()
                .map(move |p| RawRanking::new(row.player_id.clone(), *p))
        })
        .collect()
}

/// Rows of a rated game with fresh Elo and OpenSkill columns
fn rated_rows(rows: Vec<GameResult>, rated: &RatedGame) -> Vec<GameResult> {
    rows.into_iter()
        .map(|mut row| {
            let index = rated
                .ranking
                .iter()
                .position(|entry| entry.player_id == row.player_id);

            if let Some(index) = index {
                let elo = &rated.elo[index];
                let os = &rated.openskill[index];

                row.normalized_position = rated.ranking[index].normalized_position;
                row.elo_before = elo.elo_before;
                row.elo_after = elo.elo_after;
                row.elo_change = elo.change;
                row.os_before = os.ordinal_before;
                row.os_after = os.ordinal_after;
                row.os_change = os.ordinal_change;
            }
            row
        })
        .collect()
}

/// A row of an unrated game keeps the player's ratings at that point
fn neutral_row(mut row: GameResult, state: &PlayerState) -> GameResult {
    if let Some(player) = state.get(&row.player_id) {
        row.elo_before = player.elo;
        row.elo_after = player.elo;
        row.elo_change = 0.0;
        row.os_before = player.os_ordinal;
        row.os_after = player.os_ordinal;
        row.os_change = 0.0;
    }
    row
}
