//! Core configuration structure and builder for the collective engine.

use crate::config::ConfigFormat;
use crate::core::constants::*;
use crate::core::error::{CollectiveError, Result};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Settings for a [`CollectiveEngine`](crate::collective::CollectiveEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectiveConfig {
    /// Timeout applied to every send and receive wait, in milliseconds
    pub timeout_ms: u64,
    /// Declared number of servers at start-up. When `None` the size is read
    /// from the membership handle passed to `initialize`.
    pub initial_server_num: Option<u32>,
    /// Log verbosity (-1 fatal, 0 warning, 1 info, 2+ debug)
    pub verbosity: i32,
}

impl Default for CollectiveConfig {
    fn default() -> Self {
        CollectiveConfig {
            timeout_ms: DEFAULT_COLLECTIVE_TIMEOUT_MS,
            initial_server_num: None,
            verbosity: DEFAULT_VERBOSITY,
        }
    }
}

impl CollectiveConfig {
    /// Start a builder seeded with defaults.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Wait timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(CollectiveError::invalid_parameter(
                "timeout_ms",
                self.timeout_ms.to_string(),
                "must be positive",
            ));
        }

        if self.initial_server_num == Some(0) {
            return Err(CollectiveError::invalid_parameter(
                "initial_server_num",
                "0",
                "rank size should not be 0",
            ));
        }

        Ok(())
    }

    /// Load configuration from a `.json` or `.toml` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CollectiveError::config(format!("Failed to read config file: {}", e)))?;

        let config: CollectiveConfig = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => serde_json::from_str(&content)?,
            ConfigFormat::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a `.json` or `.toml` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| {
                CollectiveError::config(format!("Failed to serialize to TOML: {}", e))
            })?,
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from environment variables on top of defaults
    pub fn load_from_environment() -> Result<Self> {
        let mut config = CollectiveConfig::default();
        config.apply_environment_overrides()?;
        Ok(config)
    }

    /// Override fields that have a matching environment variable set
    pub fn apply_environment_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup`, keyed by the `RING_COLLECTIVE_*`
    /// variable names
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = val
                .parse()
                .map_err(|_| CollectiveError::config(format!("Invalid {}", ENV_TIMEOUT_MS)))?;
        }

        if let Some(val) = lookup(ENV_SERVER_NUM) {
            let num: u32 = val
                .parse()
                .map_err(|_| CollectiveError::config(format!("Invalid {}", ENV_SERVER_NUM)))?;
            self.initial_server_num = Some(num);
        }

        if let Some(val) = lookup(ENV_VERBOSITY) {
            self.verbosity = val
                .parse()
                .map_err(|_| CollectiveError::config(format!("Invalid {}", ENV_VERBOSITY)))?;
        }

        self.validate()
    }

    /// Parameters as a flat string map, for logging
    pub fn as_parameter_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("timeout_ms".to_string(), self.timeout_ms.to_string());
        map.insert(
            "initial_server_num".to_string(),
            self.initial_server_num
                .map(|n| n.to_string())
                .unwrap_or_else(|| "auto".to_string()),
        );
        map.insert("verbosity".to_string(), self.verbosity.to_string());
        map
    }
}

/// Builder for [`CollectiveConfig`]; validation errors are reported by `build`.
#[derive(Debug)]
pub struct ConfigBuilder {
    config: CollectiveConfig,
    validation_errors: Vec<String>,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        ConfigBuilder {
            config: CollectiveConfig::default(),
            validation_errors: Vec::new(),
        }
    }

    /// Set the wait timeout in milliseconds
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        if timeout_ms == 0 {
            self.validation_errors
                .push("timeout_ms must be positive".to_string());
        }
        self.config.timeout_ms = timeout_ms;
        self
    }

    /// Set the wait timeout
    pub fn timeout(self, timeout: Duration) -> Self {
        let millis = timeout.as_millis().min(u64::MAX as u128) as u64;
        self.timeout_ms(millis)
    }

    /// Declare the initial number of servers
    pub fn initial_server_num(mut self, num: u32) -> Self {
        if num == 0 {
            self.validation_errors
                .push("initial_server_num must be at least 1".to_string());
        }
        self.config.initial_server_num = Some(num);
        self
    }

    /// Set the log verbosity
    pub fn verbosity(mut self, verbosity: i32) -> Self {
        self.config.verbosity = verbosity;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<CollectiveConfig> {
        if !self.validation_errors.is_empty() {
            return Err(CollectiveError::config(format!(
                "Configuration validation failed: {}",
                self.validation_errors.join(", ")
            )));
        }

        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
