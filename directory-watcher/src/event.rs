//! Change batches built from raw notify events.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use notify::EventKind;

/// A batch of changed directories.
///
/// Directories keep the order in which they were first seen and are never
/// repeated within one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    directories: IndexSet<PathBuf>,
}

impl ChangeBatch {
    /// Create a new empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a batch from a single notify event.
    pub fn from_event(event: &notify::Event) -> Self {
        let mut batch = Self::new();
        batch.record_event(event);
        batch
    }

    /// Record every path of an event, unless the event carries no change.
    pub fn record_event(&mut self, event: &notify::Event) {
        if !is_change(event.kind) {
            return;
        }

        for path in &event.paths {
            self.record_path(path);
        }
    }

    /// Record the directory affected by a change to `path`.
    pub fn record_path(&mut self, path: &Path) {
        self.directories.insert(changed_directory(path));
    }

    /// Merge another batch into this one.
    pub fn merge(&mut self, other: ChangeBatch) {
        self.directories.extend(other.directories);
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    /// Get the number of directories.
    pub fn len(&self) -> usize {
        self.directories.len()
    }

    /// Take the directories out of the batch, leaving it empty.
    pub fn take(&mut self) -> Vec<PathBuf> {
        self.directories.drain(..).collect()
    }

    /// Consume the batch into its directories.
    pub fn into_paths(self) -> Vec<PathBuf> {
        self.directories.into_iter().collect()
    }
}

/// Whether an event kind means the tree may have changed.
fn is_change(kind: EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

/// The directory a client has to rescan after `path` changed.
///
/// A path that no longer exists is assumed to have been a file.
pub fn changed_directory(path: &Path) -> PathBuf {
    if path.is_dir() {
        return path.to_path_buf();
    }

    match path.parent() {
        Some(parent) => parent.to_path_buf(),
        None => path.to_path_buf(),
    }
}
