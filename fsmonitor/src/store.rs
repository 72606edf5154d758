//! Pending changes per replica.

use std::collections::HashMap;
use std::ffi::OsString;

/// Relative paths reported for each tracked replica, in arrival order.
///
/// Duplicates are kept: the same directory changing twice is listed twice.
/// Only tracked hashes accept changes, so a batch arriving after `RESET`
/// cannot resurrect an entry.
#[derive(Debug, Default)]
pub struct ChangeStore {
    pending: HashMap<String, Vec<OsString>>,
}

impl ChangeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting changes for `hash`. Existing changes are kept.
    pub fn track(&mut self, hash: &str) {
        self.pending.entry(hash.to_string()).or_default();
    }

    /// Whether `hash` currently accepts changes.
    pub fn is_tracked(&self, hash: &str) -> bool {
        self.pending.contains_key(hash)
    }

    /// Append `paths` for `hash`.
    ///
    /// Returns `false` and drops the paths if `hash` is not tracked.
    pub fn append<I>(&mut self, hash: &str, paths: I) -> bool
    where
        I: IntoIterator<Item = OsString>,
    {
        match self.pending.get_mut(hash) {
            Some(entry) => {
                entry.extend(paths);
                true
            }
            None => false,
        }
    }

    /// Take all pending paths for `hash`, leaving the entry empty.
    pub fn pull(&mut self, hash: &str) -> Vec<OsString> {
        self.pending
            .get_mut(hash)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Whether `hash` has changes waiting to be pulled.
    pub fn has_pending(&self, hash: &str) -> bool {
        self.pending.get(hash).is_some_and(|paths| !paths.is_empty())
    }

    /// Stop tracking `hash`, discarding anything pending.
    pub fn remove(&mut self, hash: &str) {
        self.pending.remove(hash);
    }
}
