//! Integration tests for the card-ladder rating engine
//!
//! These tests validate the system working together, including:
//! - Normalization feeding the Elo and OpenSkill updaters
//! - Incremental submission through the rating service
//! - Full history recomputation and its consistency with submissions
//! - Persistence round trips through the JSON data file
//! - Error handling without partial writes

// Modules for organizing tests
mod fixtures;

use card_ladder::config::RatingConfig;
use card_ladder::error::{rating_error, RatingError};
use card_ladder::rating::{compute_whr, elo_update, normalize, openskill_update};
use card_ladder::stats::RatingKind;
use card_ladder::storage::{GameStore, InMemoryGameStore};
use card_ladder::types::{EloParticipant, OpenSkillParticipant, WhrGame};
use card_ladder::RatingService;
use chrono::Duration;
use std::sync::Arc;

use fixtures::{
    play, raw, sample_season, season_start, service_with_players, FlakyStore, SEASON_PLAYERS,
};

#[test]
fn test_rejoin_scenario_through_elo() {
    let ranking = normalize(&raw(&[("p1", 1.0), ("p2", 2.0), ("p3", 3.0), ("p3", 4.0)])).unwrap();

    let order: Vec<(&str, f64)> = ranking
        .iter()
        .map(|r| (r.player_id.as_str(), r.normalized_position))
        .collect();
    assert_eq!(order, vec![("p1", 1.0), ("p2", 2.0), ("p3", 3.5)]);

    let participants: Vec<EloParticipant> = ranking
        .iter()
        .map(|r| EloParticipant {
            player_id: r.player_id.clone(),
            elo: 1000.0,
            games_played: 10,
            normalized_position: r.normalized_position,
        })
        .collect();
    let changes = elo_update(&participants).unwrap();

    assert_eq!(changes[0].player_id, "p1");
    assert!(changes[0].elo_after > changes[1].elo_after);
    assert!(changes[1].elo_after > changes[2].elo_after);
    for change in &changes {
        assert_eq!(change.games_played_after, 11);
    }
}

#[test]
fn test_openskill_after_normalization() {
    let ranking = normalize(&raw(&[("a", 2.0), ("b", 1.0), ("c", 2.0), ("d", 4.0)])).unwrap();
    let participants: Vec<OpenSkillParticipant> = ranking
        .iter()
        .map(|r| OpenSkillParticipant {
            player_id: r.player_id.clone(),
            mu: 25.0,
            sigma: 25.0 / 3.0,
            normalized_position: r.normalized_position,
        })
        .collect();

    let changes = openskill_update(&participants).unwrap();

    assert_eq!(changes[0].player_id, "b");
    assert!(changes[0].mu_after >= changes[0].mu_before);
    for change in &changes {
        assert!(change.sigma_after <= change.sigma_before);
    }

    // a and c share second place and started equal
    let a = changes.iter().find(|c| c.player_id == "a").unwrap();
    let c = changes.iter().find(|c| c.player_id == "c").unwrap();
    assert_eq!(a.rank, c.rank);
    assert!((a.mu_after - c.mu_after).abs() < 1e-12);
}

#[test]
fn test_whr_over_season_is_idempotent() {
    let games: Vec<WhrGame> = sample_season()
        .into_iter()
        .enumerate()
        .map(|(i, (played_at, players))| WhrGame {
            game_id: uuid::Uuid::from_u128(i as u128 + 1),
            played_at,
            players,
        })
        .collect();

    let first = compute_whr(&games).unwrap();
    let second = compute_whr(&games).unwrap();
    assert_eq!(first.game_snapshots, second.game_snapshots);
    assert_eq!(first.player_ratings, second.player_ratings);

    let first_game = &first.game_changes[&games[0].game_id];
    for player in ["ana", "ben", "cho", "dev"] {
        assert_eq!(first_game[player], 0.0);
    }
}

#[tokio::test]
async fn test_season_submission_updates_every_participant() {
    let (store, service) = service_with_players(RatingConfig::default(), &SEASON_PLAYERS).await;
    play(&service, &sample_season()).await;

    let games = store.list_games().await.unwrap();
    assert_eq!(games.len(), 5);
    assert_eq!(games[1].total_players, 5);

    let eli = store.get_player(&"eli".to_string()).await.unwrap().unwrap();
    assert_eq!(eli.games_played, 2);

    let eli_rows = store.results_for_player(&"eli".to_string()).await.unwrap();
    assert_eq!(eli_rows[0].raw_positions, vec![3.0, 5.0]);
    assert_eq!(eli_rows[0].normalized_position, 4.0);

    let ana = store.get_player(&"ana".to_string()).await.unwrap().unwrap();
    assert_eq!(ana.games_played, 5);
    let ana_rows = store.results_for_player(&"ana".to_string()).await.unwrap();
    assert_eq!(ana_rows.last().unwrap().elo_after, ana.elo);
    for pair in ana_rows.windows(2) {
        assert_eq!(pair[0].elo_after, pair[1].elo_before);
        assert_eq!(pair[0].os_after, pair[1].os_before);
    }
}

#[tokio::test]
async fn test_recompute_agrees_with_incremental_history() {
    let (store, service) = service_with_players(RatingConfig::default(), &SEASON_PLAYERS).await;
    play(&service, &sample_season()).await;

    let incremental = store.list_results().await.unwrap();
    let report = service.recompute_all().await.unwrap();
    assert!(report.complete);
    assert_eq!(report.games_processed, 5);

    let recomputed = store.list_results().await.unwrap();
    for (before, after) in incremental.iter().zip(&recomputed) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.elo_after, after.elo_after);
        assert_eq!(before.elo_change, after.elo_change);
        assert!((before.os_after - after.os_after).abs() < 1e-9);
    }

    let board = service.leaderboard(RatingKind::Whr).await.unwrap();
    assert_eq!(board.len(), 5);
    let ana = board.iter().find(|e| e.player_id == "ana").unwrap();
    let dev = board.iter().find(|e| e.player_id == "dev").unwrap();
    assert!(ana.rating > dev.rating);
}

#[tokio::test]
async fn test_recompute_twice_is_stable() {
    let (store, service) = service_with_players(RatingConfig::default(), &SEASON_PLAYERS).await;
    play(&service, &sample_season()).await;

    service.recompute_all().await.unwrap();
    let first = store.snapshot().unwrap();
    service.recompute_all().await.unwrap();
    assert_eq!(store.snapshot().unwrap(), first);
}

#[tokio::test]
async fn test_late_submission_is_replayed_in_time_order() {
    let (store, service) = service_with_players(RatingConfig::default(), &SEASON_PLAYERS).await;
    let mut season = sample_season();
    let late = season.remove(0);
    play(&service, &season).await;

    // Recorded last but played first
    service.submit_game(late.0, &late.1).await.unwrap();
    service.recompute_all().await.unwrap();
    let replayed = store.snapshot().unwrap();

    let (in_order_store, in_order) =
        service_with_players(RatingConfig::default(), &SEASON_PLAYERS).await;
    play(&in_order, &sample_season()).await;
    let expected = in_order_store.snapshot().unwrap();

    for (got, want) in replayed.players.iter().zip(&expected.players) {
        assert_eq!(got.id, want.id);
        assert_eq!(got.elo, want.elo);
        assert!((got.os_mu - want.os_mu).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_failed_write_persists_nothing() {
    let store = Arc::new(FlakyStore::new());
    let service = RatingService::new(store.clone(), RatingConfig::default()).unwrap();
    for name in SEASON_PLAYERS {
        service.register_player(name).await.unwrap();
    }

    store.set_fail_writes(true);
    let err = service
        .submit_game(season_start(), &raw(&[("ana", 1.0), ("ben", 2.0)]))
        .await
        .unwrap_err();
    assert!(matches!(
        rating_error(&err),
        Some(RatingError::StorageError { .. })
    ));

    assert_eq!(store.commit_count(), 0);
    assert!(store.list_games().await.unwrap().is_empty());
    let ana = store.get_player(&"ana".to_string()).await.unwrap().unwrap();
    assert_eq!(ana.games_played, 0);
    assert_eq!(ana.elo, 1000.0);

    store.set_fail_writes(false);
    service
        .submit_game(season_start(), &raw(&[("ana", 1.0), ("ben", 2.0)]))
        .await
        .unwrap();
    assert_eq!(store.commit_count(), 1);
}

#[tokio::test]
async fn test_failed_recompute_write_keeps_previous_ratings() {
    let store = Arc::new(FlakyStore::new());
    let service = RatingService::new(store.clone(), RatingConfig::default()).unwrap();
    for name in SEASON_PLAYERS {
        service.register_player(name).await.unwrap();
    }
    play(&service, &sample_season()).await;

    let before = store.inner().snapshot().unwrap();
    store.set_fail_writes(true);
    assert!(service.recompute_all().await.is_err());
    assert_eq!(store.inner().snapshot().unwrap(), before);
}

#[tokio::test]
async fn test_invalid_positions_rejected() {
    let (store, service) = service_with_players(RatingConfig::default(), &SEASON_PLAYERS).await;

    for rankings in [
        raw(&[("ana", -1.0), ("ben", 2.0)]),
        raw(&[("ana", f64::NAN), ("ben", 2.0)]),
        raw(&[("", 1.0), ("ben", 2.0)]),
        raw(&[("ana", 1.0)]),
        vec![],
    ] {
        let err = service
            .submit_game(season_start(), &rankings)
            .await
            .unwrap_err();
        assert!(matches!(
            rating_error(&err),
            Some(RatingError::InvalidInput { .. })
        ));
    }

    assert!(store.list_games().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_data_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ladder.json");

    {
        let store = Arc::new(InMemoryGameStore::load_json(&path).unwrap());
        let service = RatingService::new(store.clone(), RatingConfig::default()).unwrap();
        for name in SEASON_PLAYERS {
            service.register_player(name).await.unwrap();
        }
        play(&service, &sample_season()).await;
        service.recompute_all().await.unwrap();
        store.save_json(&path, true).unwrap();
    }

    let reloaded = Arc::new(InMemoryGameStore::load_json(&path).unwrap());
    let service = RatingService::new(reloaded.clone(), RatingConfig::default()).unwrap();
    let before = reloaded.snapshot().unwrap();

    service
        .submit_game(
            season_start() + Duration::days(28),
            &raw(&[("dev", 1.0), ("eli", 2.0)]),
        )
        .await
        .unwrap();

    let profile = service.player_profile(&"dev".to_string()).await.unwrap();
    assert_eq!(profile.games_played, 4);
    assert_eq!(profile.history.last().unwrap().normalized_position, 1.0);
    assert_eq!(reloaded.list_games().await.unwrap().len(), before.games.len() + 1);
}
