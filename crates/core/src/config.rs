//! Draft server configuration
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all) gives a working single-worker setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    pub auction: AuctionConfig,
    pub persistence: PersistenceConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    /// Round length for newly created auctions
    pub timer_seconds: u32,
    /// Timer task tick interval
    pub tick_millis: u64,
    /// Replication bus buffer per subscriber
    pub replication_capacity: usize,
    /// Pause between a round running out and the next player appearing
    pub intermission_ms: u64,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            timer_seconds: 30,
            tick_millis: 1_000,
            replication_capacity: 1_024,
            intermission_ms: 3_000,
        }
    }
}

impl AuctionConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    pub fn intermission(&self) -> Duration {
        Duration::from_millis(self.intermission_ms)
    }
}

/// Retry policy for durable writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
        }
    }
}

impl PersistenceConfig {
    /// Delay before retry number `attempt` (1-based), doubling up to the cap
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let millis = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(millis.min(self.max_backoff_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Worker `i` listens on `base_port + i`
    pub base_port: u16,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            base_port: 7450,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file; the platform data directory is used when unset
    pub database: Option<PathBuf>,
}

impl DraftConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DraftConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auction.timer_seconds == 0 {
            return Err(ConfigError::Invalid("auction.timer_seconds must be positive".into()));
        }
        if self.auction.tick_millis == 0 {
            return Err(ConfigError::Invalid("auction.tick_millis must be positive".into()));
        }
        if self.auction.replication_capacity == 0 {
            return Err(ConfigError::Invalid(
                "auction.replication_capacity must be positive".into(),
            ));
        }
        if self.persistence.max_attempts == 0 {
            return Err(ConfigError::Invalid("persistence.max_attempts must be positive".into()));
        }
        if self.server.workers == 0 {
            return Err(ConfigError::Invalid("server.workers must be positive".into()));
        }
        if usize::from(self.server.base_port) + self.server.workers > usize::from(u16::MAX) + 1 {
            return Err(ConfigError::Invalid("server port range overflows".into()));
        }
        Ok(())
    }
}
