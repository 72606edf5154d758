//! Watched replicas and their registry.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use fsmonitor_directory_watcher::Subscription;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Root of a replica, able to turn reported directories into relative paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaRoot {
    given: PathBuf,
    canonical: Option<PathBuf>,
}

impl ReplicaRoot {
    /// Describe the root the client named, resolving it when possible.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let given = root.into();
        let canonical = std::fs::canonicalize(&given)
            .ok()
            .filter(|resolved| *resolved != given);
        Self { given, canonical }
    }

    /// The root as the client named it.
    pub fn path(&self) -> &Path {
        &self.given
    }

    /// Express `directory` relative to the root, joined with `/`.
    ///
    /// The root itself maps to the empty path. Directories outside the root
    /// yield `None`. Component bytes are kept as the OS reported them.
    pub fn relativize(&self, directory: &Path) -> Option<OsString> {
        let relative = self
            .canonical
            .as_deref()
            .and_then(|root| directory.strip_prefix(root).ok())
            .or_else(|| directory.strip_prefix(&self.given).ok())?;

        let mut joined = OsString::new();
        for (i, component) in relative.components().enumerate() {
            if i > 0 {
                joined.push("/");
            }
            joined.push(component.as_os_str());
        }
        Some(joined)
    }
}

/// A watched directory tree, owned by the [`ReplicaRegistry`].
pub struct Replica {
    hash: String,
    root: ReplicaRoot,
    token: CancellationToken,
    subscription: Box<dyn Subscription>,
}

impl Replica {
    /// Bundle a started subscription with the token its callback checks.
    pub fn new(
        hash: impl Into<String>,
        root: ReplicaRoot,
        token: CancellationToken,
        subscription: Box<dyn Subscription>,
    ) -> Self {
        Self {
            hash: hash.into(),
            root,
            token,
            subscription,
        }
    }

    /// The replica's hash.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Stop the watch. Blocks until the subscription is torn down.
    pub fn stop(self) {
        self.token.cancel();
        self.subscription.stop();
        info!(hash = %self.hash, root = %self.root.path().display(), "Replica stopped");
    }
}

/// Replicas keyed by hash, at most one per hash.
#[derive(Default)]
pub struct ReplicaRegistry {
    replicas: HashMap<String, Replica>,
}

impl ReplicaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a replica is registered for `hash`.
    pub fn contains(&self, hash: &str) -> bool {
        self.replicas.contains_key(hash)
    }

    /// Register a replica. An existing replica for the same hash wins and the
    /// new one is handed back to the caller.
    pub fn insert(&mut self, replica: Replica) -> Option<Replica> {
        if self.replicas.contains_key(replica.hash()) {
            return Some(replica);
        }
        self.replicas.insert(replica.hash.clone(), replica);
        None
    }

    /// Unregister the replica for `hash`.
    ///
    /// Its token is cancelled immediately so pending callbacks drop their
    /// batches; the caller still has to [`Replica::stop`] it.
    pub fn remove(&mut self, hash: &str) -> Option<Replica> {
        let replica = self.replicas.remove(hash)?;
        replica.token.cancel();
        Some(replica)
    }

    /// Unregister every replica.
    pub fn drain(&mut self) -> Vec<Replica> {
        let replicas: Vec<Replica> = self.replicas.drain().map(|(_, replica)| replica).collect();
        for replica in &replicas {
            replica.token.cancel();
        }
        replicas
    }

    /// Number of registered replicas.
    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    /// Whether no replica is registered.
    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}
