//! Arming state shared by all replicas.

use std::collections::HashSet;

/// Tracks whether the client is blocked waiting for a push.
///
/// There is one arming window for the whole session: while armed, a change
/// on any replica triggers a push, whichever hashes the client waited on.
#[derive(Debug, Default)]
pub struct WaitCoordinator {
    armed: bool,
    waiting: HashSet<String>,
}

impl WaitCoordinator {
    /// Create a disarmed coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the session and record interest in `hash`.
    pub fn arm(&mut self, hash: &str) {
        self.armed = true;
        self.waiting.insert(hash.to_string());
    }

    /// Close the arming window.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.waiting.clear();
    }

    /// Whether a change should be pushed right now.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Whether `hash` was waited on in the current window.
    pub fn is_waiting_on(&self, hash: &str) -> bool {
        self.waiting.contains(hash)
    }

    /// Drop the wait registration for `hash`. The window stays as it is.
    pub fn forget(&mut self, hash: &str) {
        self.waiting.remove(hash);
    }
}
