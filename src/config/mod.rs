//! Configuration management for card-ladder
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values for the rating engine.

pub mod app;
pub mod rating;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings, StorageSettings};
pub use rating::RatingConfig;
