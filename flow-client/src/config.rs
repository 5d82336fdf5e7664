//! Configuration loading for flow-client.
//!
//! Configuration is loaded from a TOML file; every section and field is
//! optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for flow-client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Offline queue configuration.
    #[serde(default)]
    pub queue: QueueSettings,
    /// Sync scheduling configuration.
    #[serde(default)]
    pub sync: SyncSettings,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Offline queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueSettings {
    /// Maximum queued actions (default: 500).
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    /// Failed attempts before a queued action is dropped (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Sync scheduling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncSettings {
    /// Periodic sync interval in seconds (default: 300).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Enable the periodic sync task (default: true).
    #[serde(default = "default_periodic")]
    pub periodic: bool,
}

impl SyncSettings {
    /// The periodic interval, never shorter than one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive (default: "info").
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default value functions
fn default_max_len() -> usize {
    500
}

fn default_max_attempts() -> u32 {
    5
}

fn default_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_periodic() -> bool {
    true
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_len: default_max_len(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            periodic: default_periodic(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
