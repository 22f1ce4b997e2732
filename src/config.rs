use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::{Db, DEFAULT_BUSY_TIMEOUT_MS};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub archgraph: ArchgraphConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// archgraph-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchgraphConfig {
    /// SQLite file holding the graph
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Graph store tuning
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { busy_timeout_ms: default_busy_timeout_ms() }
    }
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in ARCHGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("ARCHGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::parse(&config_str)
    }

    /// Parse and validate a TOML document
    pub fn parse(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.archgraph.db_path.as_os_str().is_empty() {
            anyhow::bail!("archgraph.db_path must not be empty");
        }

        if let Some(parent) = self.archgraph.db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                anyhow::bail!(
                    "Directory for archgraph.db_path does not exist: {}",
                    parent.display()
                );
            }
        }

        if self.store.busy_timeout_ms == 0 {
            anyhow::bail!("store.busy_timeout_ms must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.archgraph.db_path
    }

    /// Store handle configured from this file
    pub fn open_db(&self) -> Db {
        Db::new(self.db_path()).with_busy_timeout(Duration::from_millis(self.store.busy_timeout_ms))
    }
}
