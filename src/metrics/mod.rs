//! Metrics for the rating engine
//!
//! This module provides Prometheus metrics for game submissions and full
//! history recomputation.

pub mod collector;

pub use collector::{MetricsCollector, MetricsTimer, RecomputeMetrics, SubmissionMetrics};
