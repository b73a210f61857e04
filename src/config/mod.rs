//! Configuration management for the collective engine.
//!
//! Configuration can come from code (via [`ConfigBuilder`]), from a `.toml`
//! or `.json` file, or from `RING_COLLECTIVE_*` environment variables.

pub mod core;

pub use self::core::{CollectiveConfig, ConfigBuilder};

use crate::core::error::{CollectiveError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "ring_collective.toml";

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigFormat {
    /// TOML configuration format
    Toml,
    /// JSON configuration format
    Json,
}

impl Default for ConfigFormat {
    fn default() -> Self {
        ConfigFormat::Toml
    }
}

impl ConfigFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            _ => Err(CollectiveError::config(
                "Unsupported config file format. Use .json or .toml",
            )),
        }
    }
}
