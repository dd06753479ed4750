//! Logging setup
//!
//! Installs a `tracing` subscriber. `RUST_LOG` wins over the configured
//! level when set.

use crate::config::LoggingConfig;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// Configuration for the logging subsystem
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub with_timestamp: bool,
    pub with_target: bool,
    pub json_format: bool,
    /// Append to this file instead of stdout
    pub log_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamp: true,
            with_target: true,
            json_format: false,
            log_file: None,
        }
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.with_timestamp = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}

impl TryFrom<&LoggingConfig> for LogConfig {
    type Error = LoggingError;

    fn try_from(config: &LoggingConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            level: config.level.parse()?,
            with_timestamp: config.with_timestamp,
            with_target: config.with_target,
            json_format: config.json_format,
            log_file: config.log_file.clone(),
        })
    }
}

/// Initialize logging with the default configuration
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging; fails if a global subscriber is already installed
///
/// # Example
/// ```
/// use communities_core::logging::{init_logging_with_config, LogConfig, LogLevel};
///
/// let config = LogConfig::new(LogLevel::Debug).with_target(false);
/// init_logging_with_config(config).expect("Failed to initialize logging");
/// ```
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let writer = match &config.log_file {
        Some(path) => {
            let file = File::options().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    let fmt_layer = fmt::layer()
        .with_target(config.with_target)
        .with_writer(writer);
    let fmt_layer = match (config.json_format, config.with_timestamp) {
        (true, true) => fmt_layer.json().boxed(),
        (true, false) => fmt_layer.json().without_time().boxed(),
        (false, true) => fmt_layer.boxed(),
        (false, false) => fmt_layer.without_time().boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new(LogLevel::Debug)
            .with_timestamp(false)
            .with_target(false)
            .json_format(true)
            .with_log_file("/tmp/communities.log");

        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.with_timestamp);
        assert!(!config.with_target);
        assert!(config.json_format);
        assert!(config.log_file.is_some());
    }

    #[test]
    fn test_log_config_from_settings() {
        let settings = LoggingConfig {
            level: "warn".to_string(),
            json_format: true,
            ..Default::default()
        };
        let config = LogConfig::try_from(&settings).unwrap();
        assert_eq!(config.level, LogLevel::Warn);
        assert!(config.json_format);

        let settings = LoggingConfig {
            level: "chatty".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            LogConfig::try_from(&settings),
            Err(LoggingError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_second_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig::new(LogLevel::Debug).with_log_file(dir.path().join("test.log"));

        // Another test may have installed the global subscriber first
        let _ = init_logging_with_config(config.clone());
        assert!(init_logging_with_config(config).is_err());
        assert!(dir.path().join("test.log").exists());
    }
}
