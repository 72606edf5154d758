//! Coalescing of change batches over a time window.
//!
//! Hand-driven rather than built on `notify-debouncer-mini`, which cannot
//! deliver the first change of a burst on the leading edge.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::WatchOptions;
use crate::event::ChangeBatch;

/// Merges change batches so that at most one batch is delivered per window.
///
/// The coalescer never reads the clock itself; callers pass `now` so the
/// timing rules can be exercised deterministically.
#[derive(Debug)]
pub struct Coalescer {
    window: Duration,
    leading_edge: bool,
    pending: ChangeBatch,
    deadline: Option<Instant>,
    last_delivery: Option<Instant>,
}

impl Coalescer {
    /// Create a coalescer for the given options.
    pub fn new(options: &WatchOptions) -> Self {
        Self {
            window: options.coalesce_window(),
            leading_edge: options.emit_initial_event,
            pending: ChangeBatch::new(),
            deadline: None,
            last_delivery: None,
        }
    }

    /// Record a batch observed at `now`.
    ///
    /// Returns the directories to deliver right away, if the batch opens a
    /// new burst and leading-edge delivery is enabled.
    pub fn record(&mut self, batch: ChangeBatch, now: Instant) -> Option<Vec<PathBuf>> {
        if batch.is_empty() {
            return None;
        }

        if self.leading_edge && self.deadline.is_none() && self.is_quiet(now) {
            self.last_delivery = Some(now);
            return Some(batch.into_paths());
        }

        self.pending.merge(batch);
        if self.deadline.is_none() {
            let opened_at = match (self.leading_edge, self.last_delivery) {
                (true, Some(last)) => last,
                _ => now,
            };
            self.deadline = Some(opened_at + self.window);
        }
        None
    }

    /// Deliver the pending directories if the window has expired at `now`.
    pub fn flush(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                if self.pending.is_empty() {
                    return None;
                }
                self.last_delivery = Some(now);
                Some(self.pending.take())
            }
            _ => None,
        }
    }

    /// When the pending directories are due, if any are waiting.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn is_quiet(&self, now: Instant) -> bool {
        match self.last_delivery {
            Some(last) => now.saturating_duration_since(last) >= self.window,
            None => true,
        }
    }
}
