//! Main application configuration
//!
//! This module defines the primary configuration structures for card-ladder,
//! including TOML and environment variable loading and validation.

use crate::config::rating::RatingConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub storage: StorageSettings,
    pub rating: RatingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Where the game history lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON snapshot holding players, games and results
    pub data_path: PathBuf,
    /// Write the snapshot indented
    pub pretty_json: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "card-ladder".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("card-ladder.json"),
            pretty_json: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file; missing sections fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }

        // Storage settings
        if let Ok(path) = env::var("DATA_PATH") {
            config.storage.data_path = PathBuf::from(path);
        }
        if let Ok(pretty) = env::var("PRETTY_JSON") {
            config.storage.pretty_json = pretty
                .parse()
                .map_err(|_| anyhow!("Invalid PRETTY_JSON value: {}", pretty))?;
        }

        // Rating settings
        if let Ok(initial) = env::var("ELO_INITIAL_RATING") {
            config.rating.elo.initial_rating = initial
                .parse()
                .map_err(|_| anyhow!("Invalid ELO_INITIAL_RATING value: {}", initial))?;
        }
        if let Ok(mu) = env::var("OPENSKILL_MU") {
            config.rating.openskill.mu = mu
                .parse()
                .map_err(|_| anyhow!("Invalid OPENSKILL_MU value: {}", mu))?;
        }
        if let Ok(sigma) = env::var("OPENSKILL_SIGMA") {
            config.rating.openskill.sigma = sigma
                .parse()
                .map_err(|_| anyhow!("Invalid OPENSKILL_SIGMA value: {}", sigma))?;
        }
        if let Ok(iterations) = env::var("WHR_MAX_ITERATIONS") {
            config.rating.whr.max_iterations = iterations
                .parse()
                .map_err(|_| anyhow!("Invalid WHR_MAX_ITERATIONS value: {}", iterations))?;
        }
        if let Ok(w2) = env::var("WHR_W2_PER_DAY") {
            config.rating.whr.w2_per_day = w2
                .parse()
                .map_err(|_| anyhow!("Invalid WHR_W2_PER_DAY value: {}", w2))?;
        }

        validate_config(&config)?;
        Ok(config)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.name.is_empty() {
        return Err(anyhow!("Service name cannot be empty"));
    }

    if config.storage.data_path.as_os_str().is_empty() {
        return Err(anyhow!("Data path cannot be empty"));
    }

    config.rating.validate()?;

    Ok(())
}
