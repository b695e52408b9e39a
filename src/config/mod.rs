//! Configuration management for the foursome scheduler
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::FOURSOME_CAPACITY;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scheduling configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scheduling behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum available players required to build a schedule
    pub min_players: usize,

    /// Cap on improving swap passes in the grouping heuristic
    pub max_swap_iterations: usize,

    /// Players per independently computed chunk (multiple of 4)
    pub parallel_chunk_size: usize,

    /// Compute slot chunks concurrently on the blocking pool
    pub concurrent_assignment: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_players: 4,
            max_swap_iterations: 1_000,
            parallel_chunk_size: 64,
            concurrent_assignment: false,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/foursome.db"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = SchedulerConfig::default();

        let min_players = std::env::var("FOURSOME_MIN_PLAYERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.min_players);

        let max_swap_iterations = std::env::var("FOURSOME_MAX_SWAP_ITERATIONS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.max_swap_iterations);

        let parallel_chunk_size = std::env::var("FOURSOME_CHUNK_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.parallel_chunk_size);

        let concurrent_assignment = std::env::var("FOURSOME_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(defaults.concurrent_assignment);

        let sqlite_path = std::env::var("FOURSOME_SQLITE_PATH")
            .unwrap_or_else(|_| String::from("data/foursome.db"))
            .into();

        let log_level = std::env::var("FOURSOME_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));

        let log_format =
            std::env::var("FOURSOME_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            scheduler: SchedulerConfig {
                min_players,
                max_swap_iterations,
                parallel_chunk_size,
                concurrent_assignment,
            },
            storage: StorageConfig { sqlite_path },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.min_players == 0 {
            anyhow::bail!("min_players must be greater than 0");
        }

        if self.scheduler.max_swap_iterations == 0 {
            anyhow::bail!("max_swap_iterations must be greater than 0");
        }

        let chunk = self.scheduler.parallel_chunk_size;
        if chunk == 0 || chunk % FOURSOME_CAPACITY != 0 {
            anyhow::bail!("parallel_chunk_size must be a positive multiple of {FOURSOME_CAPACITY}");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json'");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
