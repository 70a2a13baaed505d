//! Configuration management for dataformat
//!
//! Settings come from a TOML file, overridden by command-line flags.
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Export pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Records fetched per cursor page
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds the backend keeps an idle cursor alive
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,

    /// Draw a progress spinner while exporting
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,

    /// Worksheet name used by the spreadsheet format
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_batch_size() -> usize {
    100
}

fn default_keep_alive() -> u64 {
    60
}

fn default_show_progress() -> bool {
    true
}

fn default_sheet_name() -> String {
    "Sheet1".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            keep_alive: default_keep_alive(),
            show_progress: default_show_progress(),
            sheet_name: default_sheet_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// Without an explicit path the default location is tried; a missing
    /// default file yields the default configuration, a missing explicit
    /// file is an error.
    ///
    /// # Arguments
    /// * `path` - Optional path to a TOML configuration file
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dataformat")
            .join("config.toml")
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.export.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "export.batch_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.export.sheet_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "export.sheet_name".to_string(),
                value: self.export.sheet_name.clone(),
            }
            .into());
        }
        Ok(())
    }
}

impl ExportConfig {
    /// Get cursor keep-alive as Duration
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive)
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export.batch_size, 100);
        assert_eq!(config.export.keep_alive(), Duration::from_secs(60));
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml("[export]\nbatch_size = 500\n").unwrap();
        assert_eq!(config.export.batch_size, 500);
        assert_eq!(config.export.sheet_name, "Sheet1");
        assert!(config.logging.timestamps);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = Config::from_toml("[export]\nbatch_size = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml("[export\n").is_err());
        assert!(Config::from_toml("[logging]\nlevel = \"loud\"\n").is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load_from_file(Some(Path::new("/nonexistent/dataformat.toml")));
        assert!(err.is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let text = Config::default().to_toml().unwrap();
        assert!(text.contains("batch_size = 100"));
    }
}
