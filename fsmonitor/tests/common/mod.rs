//! Shared helpers for fsmonitor integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fsmonitor::{Flow, Monitor, Session};
use fsmonitor_directory_watcher::{
    BatchCallback, Subscription, WatchOptions, WatchService, WatcherError,
};

/// Output sink that can be inspected while the session writes to it.
#[derive(Clone, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    /// Everything written so far, split into lines.
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Lines written since the last call, clearing the buffer.
    pub fn take_lines(&self) -> Vec<String> {
        let lines = self.lines();
        self.0.lock().unwrap().clear();
        lines
    }

    /// Raw bytes written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Poll until a line matching `pred` appears.
    pub fn wait_for_line(&self, timeout: Duration, pred: impl Fn(&str) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.lines().iter().any(|line| pred(line)) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct FakeState {
    callbacks: HashMap<PathBuf, BatchCallback>,
    started: Vec<PathBuf>,
    stopped: Vec<PathBuf>,
    failing: HashSet<PathBuf>,
}

/// Watch service whose batches are fired by the test.
///
/// A leaky service keeps delivering to a subscription's callback after it was
/// stopped, standing in for a watcher thread that loses the race with RESET.
#[derive(Default)]
pub struct FakeWatchService {
    state: Arc<Mutex<FakeState>>,
    leaky: bool,
}

impl FakeWatchService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn leaky() -> Arc<Self> {
        Arc::new(Self {
            leaky: true,
            ..Self::default()
        })
    }

    /// Make subscriptions rooted at `root` fail.
    pub fn fail_for(&self, root: impl Into<PathBuf>) {
        self.state.lock().unwrap().failing.insert(root.into());
    }

    /// Deliver `directories` to the subscription rooted at `root`.
    ///
    /// Returns whether a callback was registered for `root`.
    pub fn fire(&self, root: impl AsRef<Path>, directories: &[&str]) -> bool {
        self.fire_paths(root, directories.iter().map(PathBuf::from).collect())
    }

    /// Like [`FakeWatchService::fire`], for paths that need not be UTF-8.
    pub fn fire_paths(&self, root: impl AsRef<Path>, directories: Vec<PathBuf>) -> bool {
        let state = self.state.lock().unwrap();
        match state.callbacks.get(root.as_ref()) {
            Some(callback) => {
                callback(directories);
                true
            }
            None => false,
        }
    }

    /// Roots subscribed so far, in order.
    pub fn started(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().started.clone()
    }

    /// Roots stopped so far, in order.
    pub fn stopped(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().stopped.clone()
    }
}

impl WatchService for FakeWatchService {
    fn subscribe(
        &self,
        root: &Path,
        _options: &WatchOptions,
        on_batch: BatchCallback,
    ) -> fsmonitor_directory_watcher::Result<Box<dyn Subscription>> {
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(root) {
            return Err(WatcherError::DirectoryNotFound(root.display().to_string()));
        }
        state.started.push(root.to_path_buf());
        state.callbacks.insert(root.to_path_buf(), on_batch);
        Ok(Box::new(FakeSubscription {
            root: root.to_path_buf(),
            state: Arc::clone(&self.state),
            leaky: self.leaky,
        }))
    }
}

struct FakeSubscription {
    root: PathBuf,
    state: Arc<Mutex<FakeState>>,
    leaky: bool,
}

impl Subscription for FakeSubscription {
    fn root(&self) -> &Path {
        &self.root
    }

    fn stop(self: Box<Self>) {
        let mut state = self.state.lock().unwrap();
        if !self.leaky {
            state.callbacks.remove(&self.root);
        }
        state.stopped.push(self.root.clone());
    }
}

/// A session wired to a fake watch service and an inspectable output.
pub struct Harness {
    pub session: Session<SharedOutput>,
    pub output: SharedOutput,
    pub watches: Arc<FakeWatchService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_service(FakeWatchService::new())
    }

    pub fn with_service(watches: Arc<FakeWatchService>) -> Self {
        let output = SharedOutput::default();
        let monitor = Monitor::new(
            Arc::clone(&watches) as Arc<dyn WatchService>,
            WatchOptions::default(),
            output.clone(),
        );
        Self {
            session: Session::new(monitor),
            output,
            watches,
        }
    }

    /// Dispatch one line, expecting it to be handled without an I/O error.
    pub fn send(&mut self, line: &str) -> Flow {
        self.session.dispatch(line).unwrap()
    }

    /// Dispatch one line and return the lines it produced.
    pub fn exchange(&mut self, line: &str) -> Vec<String> {
        self.send(line);
        self.output.take_lines()
    }

    /// START a replica and finish its scan.
    pub fn start(&mut self, hash: &str, root: &str) {
        assert_eq!(self.exchange(&format!("START {hash} {root}")), vec!["OK"]);
        assert_eq!(self.exchange("DONE"), Vec::<String>::new());
    }

    pub fn monitor(&self) -> &Arc<Monitor<SharedOutput>> {
        self.session.monitor()
    }
}
