//! Performance benchmarks for rating calculations

use card_ladder::config::RatingConfig;
use card_ladder::rating::{EloUpdater, OpenSkillConfig, OpenSkillModel, OpenSkillUpdater, WhrEngine};
use card_ladder::types::{EloParticipant, OpenSkillParticipant, RawRanking, WhrGame};
use card_ladder::{normalize, InMemoryGameStore, RatingService};
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

const NAMES: [&str; 8] = ["ana", "ben", "cho", "dev", "eli", "fay", "gus", "hal"];

/// Seats of one game: `size` players from a rotating window, last seat rejoins
fn game_rankings(round: usize, size: usize) -> Vec<RawRanking> {
    let mut rankings: Vec<RawRanking> = (0..size)
        .map(|seat| {
            RawRanking::new(
                NAMES[(round * 3 + seat) % NAMES.len()],
                ((seat + round) % size + 1) as f64,
            )
        })
        .collect();
    let rejoiner = rankings[round % size].player_id.clone();
    rankings.push(RawRanking::new(rejoiner, (size + 1) as f64));
    rankings
}

fn history(games: usize) -> Vec<WhrGame> {
    let start = Utc.with_ymd_and_hms(2024, 1, 5, 20, 0, 0).unwrap();
    (0..games)
        .map(|round| WhrGame {
            game_id: uuid::Uuid::from_u128(round as u128 + 1),
            played_at: start + Duration::days((round / 3) as i64),
            players: game_rankings(round, 4 + round % 3),
        })
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    let rankings = game_rankings(5, 6);

    c.bench_function("normalize_6_players_with_rejoin", |b| {
        b.iter(|| black_box(normalize(black_box(&rankings))))
    });
}

fn bench_incremental_updates(c: &mut Criterion) {
    let elo = EloUpdater::default();
    let plackett_luce = OpenSkillUpdater::default();
    let bradley_terry = OpenSkillUpdater::new(OpenSkillConfig {
        model: OpenSkillModel::BradleyTerryFull,
        ..OpenSkillConfig::default()
    })
    .unwrap();

    let mut group = c.benchmark_group("incremental_update");
    for size in [2usize, 4, 8] {
        let elo_participants: Vec<EloParticipant> = (0..size)
            .map(|i| EloParticipant {
                player_id: NAMES[i].to_string(),
                elo: 1000.0 + (i as f64 * 37.0),
                games_played: (i * 7) as u32,
                normalized_position: (i / 2 + 1) as f64,
            })
            .collect();
        let os_participants: Vec<OpenSkillParticipant> = (0..size)
            .map(|i| OpenSkillParticipant {
                player_id: NAMES[i].to_string(),
                mu: 25.0 + i as f64,
                sigma: 8.0 - i as f64 * 0.5,
                normalized_position: (i / 2 + 1) as f64,
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("elo", size), &elo_participants, |b, p| {
            b.iter(|| black_box(elo.update(p)))
        });
        group.bench_with_input(
            BenchmarkId::new("openskill_pl", size),
            &os_participants,
            |b, p| b.iter(|| black_box(plackett_luce.update(p))),
        );
        group.bench_with_input(
            BenchmarkId::new("openskill_bt", size),
            &os_participants,
            |b, p| b.iter(|| black_box(bradley_terry.update(p))),
        );
    }
    group.finish();
}

fn bench_whr(c: &mut Criterion) {
    let engine = WhrEngine::default();

    let mut group = c.benchmark_group("whr_full_history");
    group.sample_size(20);
    for games in [30usize, 120] {
        let history = history(games);
        group.bench_with_input(BenchmarkId::from_parameter(games), &history, |b, h| {
            b.iter(|| black_box(engine.compute(h)))
        });
    }
    group.finish();
}

fn bench_recompute(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let service = rt.block_on(async {
        let store = Arc::new(InMemoryGameStore::new());
        let service = RatingService::new(store, RatingConfig::default()).unwrap();
        for name in NAMES {
            service.register_player(name).await.unwrap();
        }
        for game in history(60) {
            service
                .submit_game(game.played_at, &game.players)
                .await
                .unwrap();
        }
        service
    });

    let mut group = c.benchmark_group("recompute");
    group.sample_size(10);
    group.bench_function("recompute_60_games", |b| {
        b.iter(|| rt.block_on(async { black_box(service.recompute_all().await) }))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_normalize,
    bench_incremental_updates,
    bench_whr,
    bench_recompute
);
criterion_main!(benches);
