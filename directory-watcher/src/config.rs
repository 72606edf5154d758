//! Configuration types for directory watching.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default coalescing window in milliseconds.
pub const DEFAULT_COALESCE_WINDOW_MS: u64 = 500;

/// Options applied to a single watch subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Minimum interval between two delivered batches, in milliseconds.
    pub coalesce_window_ms: u64,

    /// Deliver the first change after a quiet period immediately instead of
    /// holding it for a whole coalescing window.
    pub emit_initial_event: bool,
}

impl WatchOptions {
    /// Create options with the default window and leading-edge delivery.
    pub fn new() -> Self {
        Self {
            coalesce_window_ms: DEFAULT_COALESCE_WINDOW_MS,
            emit_initial_event: true,
        }
    }

    /// Set the coalescing window.
    pub fn with_coalesce_window(mut self, window: Duration) -> Self {
        self.coalesce_window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable leading-edge delivery.
    pub fn emit_initial_event(mut self, emit: bool) -> Self {
        self.emit_initial_event = emit;
        self
    }

    /// The coalescing window as a duration.
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_options() {
        let options = WatchOptions::default();

        assert_eq!(options.coalesce_window(), Duration::from_millis(500));
        assert!(options.emit_initial_event);
    }

    #[test]
    fn test_builder() {
        let options = WatchOptions::new()
            .with_coalesce_window(Duration::from_millis(20))
            .emit_initial_event(false);

        assert_eq!(options.coalesce_window_ms, 20);
        assert!(!options.emit_initial_event);
    }
}
