//! Configuration loading for the sync client.
//!
//! Configuration is loaded from a TOML file (default: `treesync.toml`). Every
//! section and field may be omitted.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for the sync client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    /// Directory storage configuration.
    #[serde(default)]
    pub directory: DirectoryConfig,
    /// Sync server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Background syncer configuration.
    #[serde(default)]
    pub syncer: SyncerConfig,
}

/// Directory storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Where directory storage lives (default: `./treesync-data`).
    #[serde(default = "default_database_location")]
    pub database_location: PathBuf,
}

/// Sync server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server host and path (default: `clients4.google.com/chrome-sync`).
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port (default: 443).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Use TLS (default: true).
    #[serde(default = "default_use_ssl")]
    pub use_ssl: bool,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Service name credentials are stored under (default: `chromiumsync`).
    #[serde(default = "default_service_id")]
    pub service_id: String,
    /// Try the last signed-in user's stored token at init (default: true).
    #[serde(default = "default_attempt_last_user_authentication")]
    pub attempt_last_user_authentication: bool,
}

/// Background syncer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncerConfig {
    /// Delay before a nudged cycle starts, in milliseconds (default: 200).
    #[serde(default = "default_nudge_delay_ms")]
    pub nudge_delay_ms: u64,
    /// How long shutdown waits for the syncer, in milliseconds
    /// (default: 60000).
    #[serde(default = "default_thread_exit_timeout_ms")]
    pub thread_exit_timeout_ms: u64,
}

impl SyncerConfig {
    /// Nudge delay as a duration.
    pub fn nudge_delay(&self) -> Duration {
        Duration::from_millis(self.nudge_delay_ms)
    }

    /// Shutdown timeout as a duration.
    pub fn thread_exit_timeout(&self) -> Duration {
        Duration::from_millis(self.thread_exit_timeout_ms)
    }
}

// Default value functions
fn default_database_location() -> PathBuf {
    PathBuf::from("treesync-data")
}

fn default_host() -> String {
    "clients4.google.com/chrome-sync".to_string()
}

fn default_port() -> u16 {
    443
}

fn default_use_ssl() -> bool {
    true
}

fn default_service_id() -> String {
    "chromiumsync".to_string()
}

fn default_attempt_last_user_authentication() -> bool {
    true
}

fn default_nudge_delay_ms() -> u64 {
    200
}

fn default_thread_exit_timeout_ms() -> u64 {
    60_000 // 1 minute
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            database_location: default_database_location(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            use_ssl: default_use_ssl(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            service_id: default_service_id(),
            attempt_last_user_authentication: default_attempt_last_user_authentication(),
        }
    }
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            nudge_delay_ms: default_nudge_delay_ms(),
            thread_exit_timeout_ms: default_thread_exit_timeout_ms(),
        }
    }
}

impl SyncConfig {
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
