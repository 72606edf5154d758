//! Error types for the monitor.

use fsmonitor_directory_watcher::WatcherError;
use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur while serving the protocol.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// A replica watch could not be established.
    #[error(transparent)]
    Watch(#[from] WatcherError),

    /// Reading input or writing a response failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}
