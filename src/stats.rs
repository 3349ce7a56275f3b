//! Read-only statistics over stored players and results
//!
//! Leaderboards, per-player profiles and the head-to-head matrix. All
//! comparisons between two players in a game go through `compare_positions`,
//! the same function the rating systems use.

use crate::error::{RatingError, Result};
use crate::rating::outcome::{compare_positions, PairwiseOutcome};
use crate::types::{Game, GameId, GameResult, Player, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Rating a leaderboard is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingKind {
    Elo,
    #[default]
    OpenSkill,
    Whr,
}

impl RatingKind {
    pub fn rating_of(self, player: &Player) -> f64 {
        match self {
            RatingKind::Elo => player.elo,
            RatingKind::OpenSkill => player.os_ordinal,
            RatingKind::Whr => player.whr_rating,
        }
    }
}

impl fmt::Display for RatingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingKind::Elo => write!(f, "elo"),
            RatingKind::OpenSkill => write!(f, "openskill"),
            RatingKind::Whr => write!(f, "whr"),
        }
    }
}

impl FromStr for RatingKind {
    type Err = RatingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "elo" => Ok(RatingKind::Elo),
            "openskill" | "os" => Ok(RatingKind::OpenSkill),
            "whr" => Ok(RatingKind::Whr),
            other => Err(RatingError::invalid_input(format!(
                "Unknown rating '{}', expected elo, openskill or whr",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Equal ratings share a rank
    pub rank: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub rating: f64,
    pub games_played: u32,
}

/// Players ordered by rating, highest first, ties by name
pub fn leaderboard(players: &[Player], by: RatingKind) -> Vec<LeaderboardEntry> {
    let mut ordered: Vec<&Player> = players.iter().collect();
    ordered.sort_by(|a, b| {
        by.rating_of(b)
            .partial_cmp(&by.rating_of(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(ordered.len());
    for (index, player) in ordered.into_iter().enumerate() {
        let rating = by.rating_of(player);
        let rank = match entries.last() {
            Some(previous) if previous.rating == rating => previous.rank,
            _ => index + 1,
        };
        entries.push(LeaderboardEntry {
            rank,
            player_id: player.id.clone(),
            name: player.name.clone(),
            rating,
            games_played: player.games_played,
        });
    }

    entries
}

/// Ratings of one player right after one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPoint {
    pub game_id: GameId,
    pub played_at: DateTime<Utc>,
    pub normalized_position: f64,
    pub elo: f64,
    pub openskill: f64,
    pub whr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub player: Player,
    pub games_played: usize,
    /// Games where the player alone held the best position
    pub wins: usize,
    /// Games where the player shared the best position
    pub ties: usize,
    pub win_rate: f64,
    pub average_position: Option<f64>,
    pub best_finish: Option<f64>,
    /// Oldest game first
    pub history: Vec<RatingPoint>,
}

/// Profile of `player` from the complete list of games and results
pub fn player_profile(
    player: &Player,
    games: &[Game],
    results: &[GameResult],
) -> Result<PlayerProfile> {
    let games_by_id: HashMap<GameId, &Game> = games.iter().map(|g| (g.id, g)).collect();

    let mut best_by_game: HashMap<GameId, (f64, usize)> = HashMap::new();
    for result in results {
        let entry = best_by_game
            .entry(result.game_id)
            .or_insert((result.normalized_position, 0));
        match compare_positions(result.normalized_position, entry.0) {
            PairwiseOutcome::Win => *entry = (result.normalized_position, 1),
            PairwiseOutcome::Draw => entry.1 += 1,
            PairwiseOutcome::Loss => {}
        }
    }

    let mut history = Vec::new();
    let mut wins = 0;
    let mut ties = 0;

    for result in results.iter().filter(|r| r.player_id == player.id) {
        let game = games_by_id.get(&result.game_id).ok_or_else(|| {
            RatingError::inconsistent_state(format!(
                "Result {} references unknown game {}",
                result.id, result.game_id
            ))
        })?;

        if let Some(&(best, holders)) = best_by_game.get(&result.game_id) {
            if compare_positions(result.normalized_position, best) == PairwiseOutcome::Draw {
                if holders == 1 {
                    wins += 1;
                } else {
                    ties += 1;
                }
            }
        }

        history.push(RatingPoint {
            game_id: game.id,
            played_at: game.played_at,
            normalized_position: result.normalized_position,
            elo: result.elo_after,
            openskill: result.os_after,
            whr: result.whr_after,
        });
    }

    history.sort_by(|a, b| {
        a.played_at
            .cmp(&b.played_at)
            .then_with(|| a.game_id.cmp(&b.game_id))
    });

    let games_played = history.len();
    let (win_rate, average_position, best_finish) = if games_played == 0 {
        (0.0, None, None)
    } else {
        let total: f64 = history.iter().map(|p| p.normalized_position).sum();
        let best = history
            .iter()
            .map(|p| p.normalized_position)
            .fold(f64::INFINITY, f64::min);
        (
            wins as f64 / games_played as f64,
            Some(total / games_played as f64),
            Some(best),
        )
    };

    Ok(PlayerProfile {
        player: player.clone(),
        games_played,
        wins,
        ties,
        win_rate,
        average_position,
        best_finish,
        history,
    })
}

/// Wins, losses and ties of one player against another (or against everyone)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl Record {
    pub fn games(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    /// Share of decided games won; `None` when nothing was decided
    pub fn win_rate(&self) -> Option<f64> {
        let decided = self.wins + self.losses;
        (decided > 0).then(|| self.wins as f64 / decided as f64)
    }

    fn add(&mut self, outcome: PairwiseOutcome) {
        match outcome {
            PairwiseOutcome::Win => self.wins += 1,
            PairwiseOutcome::Loss => self.losses += 1,
            PairwiseOutcome::Draw => self.ties += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadToHead {
    /// `matrix[a][b]` is the record of `a` against `b`
    pub matrix: BTreeMap<PlayerId, BTreeMap<PlayerId, Record>>,
    /// Record of each player against all opponents combined
    pub summary: BTreeMap<PlayerId, Record>,
}

impl HeadToHead {
    /// Count one outcome of `player` against `opponent`; unlisted players are ignored
    fn add(&mut self, player: &PlayerId, opponent: &PlayerId, outcome: PairwiseOutcome) {
        let Some(cell) = self
            .matrix
            .get_mut(player)
            .and_then(|row| row.get_mut(opponent))
        else {
            return;
        };
        cell.add(outcome);
        if let Some(total) = self.summary.get_mut(player) {
            total.add(outcome);
        }
    }

    pub fn record(&self, player: &str, opponent: &str) -> Record {
        self.matrix
            .get(player)
            .and_then(|row| row.get(opponent))
            .copied()
            .unwrap_or_default()
    }
}

/// Pairwise records of every listed player across all shared games
pub fn head_to_head(players: &[Player], results: &[GameResult]) -> HeadToHead {
    let mut h2h = HeadToHead::default();

    for player in players {
        let row = players
            .iter()
            .filter(|opponent| opponent.id != player.id)
            .map(|opponent| (opponent.id.clone(), Record::default()))
            .collect();
        h2h.matrix.insert(player.id.clone(), row);
        h2h.summary.insert(player.id.clone(), Record::default());
    }

    let mut by_game: HashMap<GameId, Vec<&GameResult>> = HashMap::new();
    for result in results {
        by_game.entry(result.game_id).or_default().push(result);
    }

    for rows in by_game.values() {
        for (i, a) in rows.iter().enumerate() {
            for b in &rows[i + 1..] {
                if a.player_id == b.player_id {
                    continue;
                }
                let outcome = compare_positions(a.normalized_position, b.normalized_position);
                h2h.add(&a.player_id, &b.player_id, outcome);
                h2h.add(&b.player_id, &a.player_id, outcome.reversed());
            }
        }
    }

    h2h
}
