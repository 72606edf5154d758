//! Shared state touched by the command loop and every watcher thread.
//!
//! All bookkeeping lives behind one lock together with the response writer,
//! so a state check and the line it causes are written as one step no matter
//! which thread gets there first.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fsmonitor_directory_watcher::{BatchCallback, WatchOptions, WatchService};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::replica::{Replica, ReplicaRegistry, ReplicaRoot};
use crate::response::{Response, ResponseWriter};
use crate::store::ChangeStore;
use crate::wait::WaitCoordinator;

struct MonitorState<W> {
    replicas: ReplicaRegistry,
    changes: ChangeStore,
    wait: WaitCoordinator,
    writer: ResponseWriter<W>,
}

/// Replica registry, change store and wait coordinator under a single lock.
pub struct Monitor<W> {
    state: Mutex<MonitorState<W>>,
    watch_service: Arc<dyn WatchService>,
    options: WatchOptions,
}

impl<W: Write + Send + 'static> Monitor<W> {
    /// Create a monitor writing responses to `out`.
    pub fn new(watch_service: Arc<dyn WatchService>, options: WatchOptions, out: W) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MonitorState {
                replicas: ReplicaRegistry::new(),
                changes: ChangeStore::new(),
                wait: WaitCoordinator::new(),
                writer: ResponseWriter::new(out),
            }),
            watch_service,
            options,
        })
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write a single response line.
    pub fn send(&self, response: &Response) -> io::Result<()> {
        self.lock().writer.send(response)
    }

    /// Watch `fspath` for `hash` unless a replica already exists.
    ///
    /// Returns whether a new replica was created. The subscription is started
    /// without holding the lock so a watch service may deliver right away.
    pub fn start_replica(self: &Arc<Self>, hash: &str, fspath: &Path) -> Result<bool> {
        let token = {
            let mut state = self.lock();
            if state.replicas.contains(hash) {
                debug!(hash, "Replica already watched");
                return Ok(false);
            }
            state.changes.track(hash);
            CancellationToken::new()
        };

        let root = ReplicaRoot::new(fspath);
        let on_batch = self.batch_callback(hash, &root, &token);
        let subscription = match self.watch_service.subscribe(fspath, &self.options, on_batch) {
            Ok(subscription) => subscription,
            Err(e) => {
                token.cancel();
                self.lock().changes.remove(hash);
                return Err(e.into());
            }
        };

        let replica = Replica::new(hash, root, token, subscription);
        let duplicate = self.lock().replicas.insert(replica);
        if let Some(duplicate) = duplicate {
            duplicate.stop();
            return Ok(false);
        }

        info!(hash, root = %fspath.display(), "Replica started");
        Ok(true)
    }

    /// Stop and forget the replica for `hash`, discarding its pending changes.
    ///
    /// Returns whether a replica existed. Blocks until its watch is torn down.
    pub fn reset_replica(&self, hash: &str) -> bool {
        let replica = {
            let mut state = self.lock();
            state.changes.remove(hash);
            state.wait.forget(hash);
            state.replicas.remove(hash)
        };

        match replica {
            Some(replica) => {
                replica.stop();
                true
            }
            None => {
                debug!(hash, "Reset of unknown replica");
                false
            }
        }
    }

    /// Drain pending changes for `hash` and write them, followed by `DONE`.
    ///
    /// Returns the number of paths written.
    pub fn send_changes(&self, hash: &str) -> io::Result<usize> {
        let mut state = self.lock();
        let paths = state.changes.pull(hash);
        let count = paths.len();
        for path in paths {
            state.writer.send(&Response::Recursive(path))?;
        }
        state.writer.send(&Response::Done)?;
        debug!(hash, count, "Sent pending changes");
        Ok(count)
    }

    /// Arm the session for `hash`, pushing at once if changes are pending.
    ///
    /// Returns whether a push was written.
    pub fn wait(&self, hash: &str) -> io::Result<bool> {
        let mut state = self.lock();
        state.wait.arm(hash);
        if !state.changes.has_pending(hash) {
            return Ok(false);
        }
        debug!(hash, "Changes already pending, pushing");
        state.writer.send(&Response::Changes(hash.to_string()))?;
        Ok(true)
    }

    /// Close the arming window.
    pub fn disarm(&self) {
        self.lock().wait.disarm();
    }

    /// Whether the session is armed.
    pub fn is_armed(&self) -> bool {
        self.lock().wait.is_armed()
    }

    /// Whether `hash` has changes waiting to be pulled.
    pub fn has_pending(&self, hash: &str) -> bool {
        self.lock().changes.has_pending(hash)
    }

    /// Whether a replica is registered for `hash`.
    pub fn is_watching(&self, hash: &str) -> bool {
        self.lock().replicas.contains(hash)
    }

    /// Number of live replicas.
    pub fn replica_count(&self) -> usize {
        self.lock().replicas.len()
    }

    /// Record a batch of changed directories for `hash`, pushing if armed.
    ///
    /// Called from watcher threads. A batch whose replica was reset is dropped.
    pub fn record_changes(
        &self,
        hash: &str,
        token: &CancellationToken,
        root: &ReplicaRoot,
        directories: Vec<PathBuf>,
    ) {
        let paths: Vec<OsString> = directories
            .iter()
            .filter_map(|directory| {
                let relative = root.relativize(directory);
                if relative.is_none() {
                    debug!(hash, directory = %directory.display(), "Ignoring path outside replica");
                }
                relative
            })
            .collect();
        if paths.is_empty() {
            return;
        }

        let mut state = self.lock();
        if token.is_cancelled() {
            debug!(hash, "Dropping batch for reset replica");
            return;
        }
        let count = paths.len();
        if !state.changes.append(hash, paths) {
            return;
        }
        debug!(hash, count, "Recorded changes");

        if state.wait.is_armed() {
            debug!(hash, "Pushing change notification");
            if let Err(e) = state.writer.send(&Response::Changes(hash.to_string())) {
                warn!(hash, "Failed to push change notification: {e}");
            }
        }
    }

    /// Stop every replica.
    pub fn shutdown(&self) {
        let replicas = self.lock().replicas.drain();
        for replica in replicas {
            replica.stop();
        }
    }

    fn batch_callback(
        self: &Arc<Self>,
        hash: &str,
        root: &ReplicaRoot,
        token: &CancellationToken,
    ) -> BatchCallback {
        let monitor = Arc::downgrade(self);
        let hash = hash.to_string();
        let root = root.clone();
        let token = token.clone();
        Box::new(move |directories: Vec<PathBuf>| {
            if let Some(monitor) = monitor.upgrade() {
                monitor.record_changes(&hash, &token, &root, directories);
            }
        })
    }
}
