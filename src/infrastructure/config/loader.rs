use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Directory holding the project configuration and database.
pub const CONFIG_DIR: &str = ".defier";

/// Blocks a course may configure.
pub const MAX_BLOCKS: usize = 3;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Course name cannot be empty")]
    EmptyCourseName,

    #[error("Invalid wins_required: {0}. Must be at least 1")]
    InvalidWinsRequired(u32),

    #[error("Invalid rounds: {0}. Must be at least 1")]
    InvalidRounds(u32),

    #[error("Invalid number of blocks: {0}. Must be between 1 and {MAX_BLOCKS}")]
    InvalidBlockCount(usize),

    #[error("Invalid block '{block}': {reason}")]
    InvalidBlock { block: String, reason: String },

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .defier/config.yaml (project config, created by init)
    /// 3. .defier/local.yaml (local overrides, optional)
    /// 4. Environment variables (DEFIER_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(CONFIG_DIR)
    }

    /// Same as [`ConfigLoader::load`] with the project directory given explicitly.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("DEFIER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let course = &config.course;
        if course.name.trim().is_empty() {
            return Err(ConfigError::EmptyCourseName);
        }
        if course.wins_required == 0 {
            return Err(ConfigError::InvalidWinsRequired(course.wins_required));
        }
        if course.defy.rounds == 0 {
            return Err(ConfigError::InvalidRounds(course.defy.rounds));
        }
        if course.blocks.is_empty() || course.blocks.len() > MAX_BLOCKS {
            return Err(ConfigError::InvalidBlockCount(course.blocks.len()));
        }

        let mut seen = HashSet::new();
        for block in &course.blocks {
            let invalid = |reason: String| ConfigError::InvalidBlock {
                block: block.title.clone(),
                reason,
            };
            if block.title.trim().is_empty() {
                return Err(invalid("title cannot be empty".to_string()));
            }
            if !seen.insert(block.title.as_str()) {
                return Err(invalid("duplicate title".to_string()));
            }
            let start = block.start().map_err(invalid)?;
            let close = block.close().map_err(invalid)?;
            if let (Some(start), Some(close)) = (start, close) {
                if start >= close {
                    return Err(invalid("start_date must be before close_date".to_string()));
                }
            }
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        Ok(())
    }
}
