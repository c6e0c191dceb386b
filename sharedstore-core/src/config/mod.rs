//! Configuration management for SharedStore
//!
//! Environment-based configuration with defaults, TOML files and validation.
//! Nothing here changes the replication protocol itself; the envelope tag is
//! a compile-time constant and is deliberately absent.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

mod error;

pub use error::ConfigError;

use crate::logging::LogLevel;
use crate::store::RemoveDispatch;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Storage context configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Command line front-end configuration
    #[serde(default)]
    pub cli: CliConfig,
}

/// Settings shared by the owner and every worker context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Capacity of a context's command channel
    pub command_buffer: usize,

    /// Messages buffered per application listener on a channel
    pub listener_capacity: usize,

    /// How the owner treats `removeItem` requests from workers
    pub remove_dispatch: RemoveDispatch,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

/// Settings for the `sharedstore` binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// How long the demo waits for every mirror to converge
    #[serde(with = "humantime_serde")]
    pub settle_timeout: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            command_buffer: 256,
            listener_capacity: 64,
            remove_dispatch: RemoveDispatch::Remove,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            settle_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: SHAREDSTORE_<SECTION>_<KEY>
    /// Example: SHAREDSTORE_CONTEXT_COMMAND_BUFFER=1024
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Context config
        if let Some(buffer) = lookup("SHAREDSTORE_CONTEXT_COMMAND_BUFFER") {
            self.context.command_buffer =
                buffer.parse().map_err(|e| invalid("SHAREDSTORE_CONTEXT_COMMAND_BUFFER", e))?;
        }
        if let Some(capacity) = lookup("SHAREDSTORE_CONTEXT_LISTENER_CAPACITY") {
            self.context.listener_capacity = capacity
                .parse()
                .map_err(|e| invalid("SHAREDSTORE_CONTEXT_LISTENER_CAPACITY", e))?;
        }
        if let Some(dispatch) = lookup("SHAREDSTORE_CONTEXT_REMOVE_DISPATCH") {
            self.context.remove_dispatch = match dispatch.as_str() {
                "remove" => RemoveDispatch::Remove,
                "legacy_set_item" => RemoveDispatch::LegacySetItem,
                other => {
                    return Err(invalid(
                        "SHAREDSTORE_CONTEXT_REMOVE_DISPATCH",
                        format!("unknown dispatch {:?}", other),
                    ))
                }
            };
        }

        // Logging config
        if let Some(level) = lookup("SHAREDSTORE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("SHAREDSTORE_LOG_JSON") {
            self.logging.json_format = json
                .parse()
                .map_err(|e| invalid("SHAREDSTORE_LOG_JSON", e))?;
        }

        // CLI config
        if let Some(timeout) = lookup("SHAREDSTORE_CLI_SETTLE_TIMEOUT") {
            self.cli.settle_timeout = humantime_serde::re::humantime::parse_duration(&timeout)
                .map_err(|e| invalid("SHAREDSTORE_CLI_SETTLE_TIMEOUT", e))?;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context.command_buffer == 0 {
            return Err(ConfigError::ValidationFailed(
                "command_buffer must be greater than 0".to_string(),
            ));
        }

        if self.context.listener_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "listener_capacity must be greater than 0".to_string(),
            ));
        }

        if LogLevel::from_str(&self.logging.level).is_none() {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        if self.cli.settle_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "settle_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|source| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

fn invalid(var: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnv {
        var,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.context.remove_dispatch, RemoveDispatch::Remove);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.context.command_buffer = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.context.listener_capacity = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.cli.settle_timeout = Duration::ZERO;
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
        let mut config = Config::default();
        config
            .apply_env(lookup(&[
                ("SHAREDSTORE_CONTEXT_COMMAND_BUFFER", "8"),
                ("SHAREDSTORE_CONTEXT_REMOVE_DISPATCH", "legacy_set_item"),
                ("SHAREDSTORE_LOG_LEVEL", "trace"),
                ("SHAREDSTORE_CLI_SETTLE_TIMEOUT", "250ms"),
            ]))
            .unwrap();

        assert_eq!(config.context.command_buffer, 8);
        assert_eq!(config.context.remove_dispatch, RemoveDispatch::LegacySetItem);
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.cli.settle_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config
            .apply_env(lookup(&[("SHAREDSTORE_CONTEXT_COMMAND_BUFFER", "lots")]))
            .is_err());
        assert!(config
            .apply_env(lookup(&[("SHAREDSTORE_CONTEXT_REMOVE_DISPATCH", "ignore")]))
            .is_err());

        let err = config
            .apply_env(lookup(&[("SHAREDSTORE_CLI_SETTLE_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "SHAREDSTORE_CLI_SETTLE_TIMEOUT",
                ..
            }
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sharedstore.toml");

        let mut config = Config::default();
        config.context.remove_dispatch = RemoveDispatch::LegacySetItem;
        config.cli.settle_timeout = Duration::from_secs(2);
        config.save_to_file(&path).unwrap();

        assert_eq!(Config::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.context, ContextConfig::default());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file("/definitely/not/here.toml"),
            Err(ConfigError::FileRead { .. })
        ));
    }
}
