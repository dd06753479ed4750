//! Configuration for the community manager
//!
//! Values come from defaults, a TOML file or `COMMUNITIES_<SECTION>_<KEY>`
//! environment variables. Durations use humantime notation (`90s`, `1h`).

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;

pub use error::ConfigError;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Manager timers and buffers
    #[serde(default)]
    pub communities: CommunitiesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunitiesConfig {
    /// How often the control node re-checks token-gated roles and channels
    #[serde(with = "humantime_serde")]
    pub member_reevaluation_interval: Duration,

    /// How often queued token-owned descriptions are verified
    #[serde(with = "humantime_serde")]
    pub owner_verification_interval: Duration,

    /// Deadline for one owner lookup
    #[serde(with = "humantime_serde")]
    pub owner_verification_timeout: Duration,

    /// Capacity of each subscriber channel
    pub subscription_buffer: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,

    /// Log file path (optional)
    pub log_file: Option<PathBuf>,
}

impl Default for CommunitiesConfig {
    fn default() -> Self {
        Self {
            member_reevaluation_interval: Duration::from_secs(60 * 60),
            owner_verification_interval: Duration::from_secs(2 * 60),
            owner_verification_timeout: Duration::from_secs(3),
            subscription_buffer: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
            log_file: None,
        }
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| ConfigError::invalid(key, e))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse().map_err(|e| ConfigError::invalid(key, e))
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: COMMUNITIES_<SECTION>_<KEY>
    /// Example: COMMUNITIES_MANAGER_OWNER_VERIFICATION_TIMEOUT=5s
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Manager config
        let key = "COMMUNITIES_MANAGER_MEMBER_REEVALUATION_INTERVAL";
        if let Some(value) = var(key) {
            config.communities.member_reevaluation_interval = parse_duration(key, &value)?;
        }
        let key = "COMMUNITIES_MANAGER_OWNER_VERIFICATION_INTERVAL";
        if let Some(value) = var(key) {
            config.communities.owner_verification_interval = parse_duration(key, &value)?;
        }
        let key = "COMMUNITIES_MANAGER_OWNER_VERIFICATION_TIMEOUT";
        if let Some(value) = var(key) {
            config.communities.owner_verification_timeout = parse_duration(key, &value)?;
        }
        let key = "COMMUNITIES_MANAGER_SUBSCRIPTION_BUFFER";
        if let Some(value) = var(key) {
            config.communities.subscription_buffer =
                value.parse().map_err(|e| ConfigError::invalid(key, e))?;
        }

        // Logging config
        if let Some(level) = var("COMMUNITIES_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(value) = var("COMMUNITIES_LOG_JSON") {
            config.logging.json_format = parse_flag("COMMUNITIES_LOG_JSON", &value)?;
        }
        if let Some(path) = var("COMMUNITIES_LOG_FILE") {
            config.logging.log_file = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let communities = &self.communities;
        let durations = [
            ("member_reevaluation_interval", communities.member_reevaluation_interval),
            ("owner_verification_interval", communities.owner_verification_interval),
            ("owner_verification_timeout", communities.owner_verification_timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if communities.subscription_buffer == 0 {
            return Err(ConfigError::ValidationFailed(
                "subscription_buffer must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.communities.member_reevaluation_interval,
            Duration::from_secs(3600)
        );
        assert_eq!(config.communities.owner_verification_timeout, Duration::from_secs(3));
        assert_eq!(config.communities.subscription_buffer, 100);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.communities.subscription_buffer = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.communities.owner_verification_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = Config::default();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("COMMUNITIES_MANAGER_OWNER_VERIFICATION_TIMEOUT", "5s"),
            ("COMMUNITIES_MANAGER_SUBSCRIPTION_BUFFER", "8"),
            ("COMMUNITIES_LOG_LEVEL", "debug"),
            ("COMMUNITIES_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.communities.owner_verification_timeout, Duration::from_secs(5));
        assert_eq!(config.communities.subscription_buffer, 8);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_env_rejects_bad_duration() {
        let result = Config::from_vars(|k| {
            (k == "COMMUNITIES_MANAGER_MEMBER_REEVALUATION_INTERVAL").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("communities.toml");

        let mut config = Config::default();
        config.communities.member_reevaluation_interval = Duration::from_secs(90);
        config.logging.json_format = true;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("communities.toml");
        std::fs::write(&path, "[communities]\nsubscription_buffer = 4\n").unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.communities.subscription_buffer, 4);
        assert_eq!(loaded.logging, LoggingConfig::default());
    }
}
