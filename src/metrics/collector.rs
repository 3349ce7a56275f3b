//! Metrics collection using Prometheus
//!
//! This module provides metrics for game submissions, history recomputation
//! and the WHR optimizer.

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the rating engine
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Incremental submission metrics
    submission_metrics: SubmissionMetrics,

    /// Batch recomputation metrics
    recompute_metrics: RecomputeMetrics,
}

/// Incremental submission metrics
#[derive(Clone)]
pub struct SubmissionMetrics {
    /// Games accepted or rejected
    pub games_submitted_total: IntCounterVec,

    /// Players seen per accepted game
    pub participants_per_game: Histogram,

    /// Time spent rating one submitted game
    pub submission_duration: Histogram,

    /// Registered players
    pub players_registered: IntGauge,
}

/// Batch recomputation metrics
#[derive(Clone)]
pub struct RecomputeMetrics {
    /// Games replayed, by outcome (rated, skipped, failed)
    pub games_replayed_total: IntCounterVec,

    /// Full recomputations, by outcome (complete, incomplete)
    pub recomputations_total: IntCounterVec,

    /// WHR sweeps needed to converge
    pub whr_iterations: Histogram,

    /// WHR runs that hit the iteration cap
    pub whr_convergence_failures_total: IntCounter,

    /// Duration of each recomputation phase
    pub phase_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let submission_metrics = SubmissionMetrics::new(&registry)?;
        let recompute_metrics = RecomputeMetrics::new(&registry)?;

        Ok(Self {
            registry,
            submission_metrics,
            recompute_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get submission metrics
    pub fn submission(&self) -> &SubmissionMetrics {
        &self.submission_metrics
    }

    /// Get recomputation metrics
    pub fn recompute(&self) -> &RecomputeMetrics {
        &self.recompute_metrics
    }

    /// Record an accepted game
    pub fn record_submission(&self, participants: usize, duration: Duration) {
        self.submission_metrics
            .games_submitted_total
            .with_label_values(&["accepted"])
            .inc();

        self.submission_metrics
            .participants_per_game
            .observe(participants as f64);

        self.submission_metrics
            .submission_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a rejected game
    pub fn record_rejected_submission(&self) {
        self.submission_metrics
            .games_submitted_total
            .with_label_values(&["rejected"])
            .inc();
    }

    /// Record a newly registered player
    pub fn record_player_registered(&self) {
        self.submission_metrics.players_registered.inc();
    }

    /// Record the outcome of replaying one game
    pub fn record_replayed_game(&self, outcome: &str) {
        self.recompute_metrics
            .games_replayed_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a finished recomputation
    pub fn record_recomputation(&self, complete: bool) {
        let status = if complete { "complete" } else { "incomplete" };

        self.recompute_metrics
            .recomputations_total
            .with_label_values(&[status])
            .inc();
    }

    /// Record a WHR run
    pub fn record_whr_run(&self, iterations: Option<usize>) {
        match iterations {
            Some(iterations) => self
                .recompute_metrics
                .whr_iterations
                .observe(iterations as f64),
            None => self.recompute_metrics.whr_convergence_failures_total.inc(),
        }
    }

    /// Record how long a recomputation phase took
    pub fn record_phase(&self, phase: &str, duration: Duration) {
        self.recompute_metrics
            .phase_duration
            .with_label_values(&[phase])
            .observe(duration.as_secs_f64());
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl SubmissionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let games_submitted_total = IntCounterVec::new(
            Opts::new("card_ladder_games_submitted_total", "Games submitted"),
            &["status"],
        )?;
        registry.register(Box::new(games_submitted_total.clone()))?;

        let participants_per_game = Histogram::with_opts(
            HistogramOpts::new(
                "card_ladder_participants_per_game",
                "Distinct players per rated game",
            )
            .buckets(vec![2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0]),
        )?;
        registry.register(Box::new(participants_per_game.clone()))?;

        let submission_duration = Histogram::with_opts(
            HistogramOpts::new(
                "card_ladder_submission_duration_seconds",
                "Time to rate and store one game",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(submission_duration.clone()))?;

        let players_registered =
            IntGauge::new("card_ladder_players_registered", "Registered players")?;
        registry.register(Box::new(players_registered.clone()))?;

        Ok(Self {
            games_submitted_total,
            participants_per_game,
            submission_duration,
            players_registered,
        })
    }
}

impl RecomputeMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let games_replayed_total = IntCounterVec::new(
            Opts::new("card_ladder_games_replayed_total", "Games replayed"),
            &["outcome"],
        )?;
        registry.register(Box::new(games_replayed_total.clone()))?;

        let recomputations_total = IntCounterVec::new(
            Opts::new("card_ladder_recomputations_total", "Full recomputations"),
            &["status"],
        )?;
        registry.register(Box::new(recomputations_total.clone()))?;

        let whr_iterations = Histogram::with_opts(
            HistogramOpts::new("card_ladder_whr_iterations", "WHR sweeps to converge")
                .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
        )?;
        registry.register(Box::new(whr_iterations.clone()))?;

        let whr_convergence_failures_total = IntCounter::new(
            "card_ladder_whr_convergence_failures_total",
            "WHR runs stopped by the iteration cap",
        )?;
        registry.register(Box::new(whr_convergence_failures_total.clone()))?;

        let phase_duration = HistogramVec::new(
            HistogramOpts::new(
                "card_ladder_recompute_phase_duration_seconds",
                "Recomputation phase duration",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["phase"],
        )?;
        registry.register(Box::new(phase_duration.clone()))?;

        Ok(Self {
            games_replayed_total,
            recomputations_total,
            whr_iterations,
            whr_convergence_failures_total,
            phase_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
