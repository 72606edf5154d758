//! Directory watcher implementation.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coalesce::Coalescer;
use crate::config::WatchOptions;
use crate::error::{Result, WatcherError};
use crate::event::ChangeBatch;

/// Upper bound on how long the worker sleeps before checking for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Callback receiving batches of changed absolute directory paths.
///
/// Invoked on the subscription's worker thread.
pub type BatchCallback = Box<dyn Fn(Vec<PathBuf>) + Send + 'static>;

/// Something that can watch a directory tree and report changed directories.
pub trait WatchService: Send + Sync {
    /// Start watching `root` recursively.
    ///
    /// `on_batch` is called with each coalesced batch until the returned
    /// subscription is stopped.
    fn subscribe(
        &self,
        root: &Path,
        options: &WatchOptions,
        on_batch: BatchCallback,
    ) -> Result<Box<dyn Subscription>>;
}

/// A live watch started by a [`WatchService`].
pub trait Subscription: Send {
    /// The directory this subscription watches.
    fn root(&self) -> &Path;

    /// Stop delivery and release OS resources.
    ///
    /// Blocks until the worker has shut down. The callback is never invoked
    /// once this returns.
    fn stop(self: Box<Self>);
}

/// Watch service backed by the platform's recommended notify watcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryWatcher;

impl DirectoryWatcher {
    /// Create a new directory watcher.
    pub fn new() -> Self {
        Self
    }

    /// Start watching `root`, returning the concrete handle.
    pub fn watch(
        &self,
        root: &Path,
        options: &WatchOptions,
        on_batch: BatchCallback,
    ) -> Result<WatchHandle> {
        if !root.exists() {
            return Err(WatcherError::DirectoryNotFound(root.display().to_string()));
        }
        if !root.is_dir() {
            return Err(WatcherError::NotADirectory(root.display().to_string()));
        }

        let (event_tx, event_rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| {
                // The worker is gone once the handle stops; late events are moot.
                let _ = event_tx.send(res);
            },
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        let token = CancellationToken::new();
        let worker_token = token.clone();
        let worker_options = options.clone();
        let worker = std::thread::Builder::new()
            .name(format!("watch:{}", root.display()))
            .spawn(move || run_worker(event_rx, worker_token, &worker_options, on_batch))?;

        info!(root = %root.display(), "Started watching");
        Ok(WatchHandle {
            root: root.to_path_buf(),
            token,
            watcher: Some(watcher),
            worker: Some(worker),
        })
    }
}

impl WatchService for DirectoryWatcher {
    fn subscribe(
        &self,
        root: &Path,
        options: &WatchOptions,
        on_batch: BatchCallback,
    ) -> Result<Box<dyn Subscription>> {
        Ok(Box::new(self.watch(root, options, on_batch)?))
    }
}

/// Handle to a running notify watch and its coalescing worker.
///
/// Dropping the handle stops the watch.
pub struct WatchHandle {
    root: PathBuf,
    token: CancellationToken,
    watcher: Option<RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Whether the handle is still delivering batches.
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    fn shutdown(&mut self) {
        self.token.cancel();
        // Dropping the watcher closes the event channel and wakes the worker.
        if let Some(mut watcher) = self.watcher.take() {
            let _ = watcher.unwatch(&self.root);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(root = %self.root.display(), "Watch worker panicked");
            }
            info!(root = %self.root.display(), "Stopped watching");
        }
    }
}

impl Subscription for WatchHandle {
    fn root(&self) -> &Path {
        &self.root
    }

    fn stop(mut self: Box<Self>) {
        self.shutdown();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    events: Receiver<notify::Result<notify::Event>>,
    token: CancellationToken,
    options: &WatchOptions,
    on_batch: BatchCallback,
) {
    let mut coalescer = Coalescer::new(options);

    while !token.is_cancelled() {
        let timeout = match coalescer.deadline() {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(POLL_INTERVAL),
            None => POLL_INTERVAL,
        };

        let received = events.recv_timeout(timeout);
        let now = Instant::now();
        let ready = match received {
            Ok(Ok(event)) => {
                debug!(kind = ?event.kind, paths = ?event.paths, "Raw watch event");
                // A steady stream of events must not hold back an expired window.
                coalescer
                    .record(ChangeBatch::from_event(&event), now)
                    .or_else(|| coalescer.flush(now))
            }
            Ok(Err(e)) => {
                warn!("Watch error: {e}");
                coalescer.flush(now)
            }
            Err(RecvTimeoutError::Timeout) => coalescer.flush(now),
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if let Some(directories) = ready {
            if token.is_cancelled() {
                break;
            }
            debug!(count = directories.len(), "Delivering change batch");
            on_batch(directories);
        }
    }
}
