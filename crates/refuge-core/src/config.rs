//! Configuration loading and typed config structures for the Refuge registry.
//!
//! The canonical configuration lives in `refuge-config.yaml` at the project
//! root. Every section is optional; missing keys fall back to the defaults
//! below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RefugeConfig {
    /// Survivor store selection and timeouts.
    #[serde(default)]
    pub store: StoreConfig,

    /// Trade execution parameters.
    #[serde(default)]
    pub trade: TradeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Optional scenario file for the runner binary.
    #[serde(default)]
    pub scenario_path: Option<PathBuf>,
}

impl RefugeConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DRAGONFLY_URL` overrides `store.dragonfly_url`
    /// - `REFUGE_SCENARIO` overrides `scenario_path`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override values with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRAGONFLY_URL") {
            self.store.dragonfly_url = val;
        }
        if let Ok(val) = std::env::var("REFUGE_SCENARIO") {
            self.scenario_path = Some(PathBuf::from(val));
        }
    }
}

/// Which registry implementation backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local map; contents are lost on exit.
    #[default]
    Memory,
    /// Dragonfly (Redis-compatible) server at `store.dragonfly_url`.
    Dragonfly,
}

/// Survivor store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Dragonfly (Redis-compatible) URL.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,

    /// Upper bound for a single load, save or list call.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

impl StoreConfig {
    /// [`Self::operation_timeout_ms`] as a [`Duration`].
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            dragonfly_url: default_dragonfly_url(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

/// Trade execution configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TradeConfig {
    /// How long a trade may wait for both survivor locks.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl TradeConfig {
    /// [`Self::lock_timeout_ms`] as a [`Duration`].
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit newline-delimited JSON instead of human-readable lines.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_dragonfly_url() -> String {
    String::from("redis://localhost:6379")
}

const fn default_operation_timeout_ms() -> u64 {
    2_000
}

const fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    String::from("info")
}
