//! Configuration for the monitor process.

use std::path::Path;

use fsmonitor_directory_watcher::WatchOptions;
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Environment variable naming an optional TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "FSMONITOR_CONFIG";

/// Environment variable overriding the coalescing window, in milliseconds.
pub const LATENCY_ENV: &str = "FSMONITOR_LATENCY_MS";

/// Configuration for the monitor process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Options applied to every replica watch.
    pub watch: WatchOptions,

    /// Log filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl MonitorConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            watch: WatchOptions::default(),
            log_filter: "warn".to_string(),
        }
    }

    /// Load the configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load the configuration using `lookup` to read environment variables.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = match lookup(CONFIG_PATH_ENV).filter(|path| !path.is_empty()) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)
    }

    /// Read a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse a TOML configuration document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(LATENCY_ENV) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| MonitorError::Config(format!("{LATENCY_ENV}={raw}: {e}")))?;
            self.watch.coalesce_window_ms = millis;
        }
        Ok(self)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}
