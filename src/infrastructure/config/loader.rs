use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::DEFAULT_TIER;

/// Project directory holding configuration and the database.
pub const CONFIG_DIR: &str = ".stagegate";

/// Prefix for environment overrides, with `__` separating nested keys.
pub const ENV_PREFIX: &str = "STAGEGATE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Stage templates must include a non-empty 'standard' template")]
    MissingStandardTemplate,

    #[error("Stage template for tier '{0}' is empty")]
    EmptyTemplate(String),

    #[error("Invalid queue_capacity: {0}. Must be at least 1")]
    InvalidQueueCapacity(usize),

    #[error("Invalid max_scan_version: {0}. Must be at least 1")]
    InvalidScanVersion(u32),

    #[error("Invalid timeout_secs: {0}. Must be at least 1")]
    InvalidTimeout(u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .stagegate/config.yaml (project config)
    /// 3. .stagegate/local.yaml (project local overrides, optional)
    /// 4. Environment variables (STAGEGATE_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`load`](Self::load), resolving the config directory under `root`.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
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
            .context(format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        match config.stages.templates.get(DEFAULT_TIER) {
            Some(stages) if !stages.is_empty() => {}
            _ => return Err(ConfigError::MissingStandardTemplate),
        }
        if let Some((tier, _)) = config.stages.templates.iter().find(|(_, stages)| stages.is_empty()) {
            return Err(ConfigError::EmptyTemplate(tier.clone()));
        }

        if config.notifier.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity(0));
        }

        if config.forge.max_scan_version == 0 {
            return Err(ConfigError::InvalidScanVersion(0));
        }

        if config.forge.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(0));
        }

        Ok(())
    }
}
