//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::storage::StorageConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Install a global tracing subscriber
    ///
    /// `RUST_LOG` takes precedence over the configured level. Fails if a
    /// global subscriber is already set.
    pub fn init(&self) -> Result<(), ConfigError> {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(&self.level))
            .map_err(|e| ConfigError::Logging(e.to_string()))?;

        let registry = tracing_subscriber::registry().with(filter);

        let result = match self.format.as_str() {
            "json" => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
            "pretty" => registry.with(tracing_subscriber::fmt::layer()).try_init(),
            other => {
                return Err(ConfigError::Logging(format!(
                    "unknown log format {:?}, expected pretty or json",
                    other
                )))
            }
        };

        result.map_err(|e| ConfigError::Logging(e.to_string()))
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        // Try default config locations
        let config_paths = [
            dirs::config_dir().map(|p| p.join("hourglass").join("config.toml")),
            Some(PathBuf::from("/etc/hourglass/config.toml")),
            Some(PathBuf::from("./hourglass.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Storage overrides
        if let Some(path) = var("HOURGLASS_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(size) = var("HOURGLASS_FLUSH_MAX_SIZE") {
            match size.parse() {
                Ok(size) => self.storage.flush_max_size = size,
                Err(_) => tracing::warn!("Ignoring invalid HOURGLASS_FLUSH_MAX_SIZE: {}", size),
            }
        }
        if let Some(ms) = var("HOURGLASS_FLUSH_MAX_DURATION_MS") {
            match ms.parse() {
                Ok(ms) => self.storage.flush_max_duration_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid HOURGLASS_FLUSH_MAX_DURATION_MS: {}", ms),
            }
        }

        // Logging overrides
        if let Some(level) = var("HOURGLASS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("HOURGLASS_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Failed to set up logging: {0}")]
    Logging(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Hourglass Configuration
#
# Environment variables override these settings:
# - HOURGLASS_PATH
# - HOURGLASS_FLUSH_MAX_SIZE
# - HOURGLASS_FLUSH_MAX_DURATION_MS
# - HOURGLASS_LOG_LEVEL
# - HOURGLASS_LOG_FORMAT

[storage]
# Log file, replayed in full on open
path = "~/.local/share/hourglass/hourglass.log"

# Flush once this many measurements are buffered
flush_max_size = 1000

# Flush once this long has passed since the last flush (ms)
flush_max_duration_ms = 3600000

# Log sync strategy: on_flush (fsync every flush) or none (leave it to the OS)
sync_mode = "on_flush"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
