//! The protocol state machine driving one client session.

use std::io::{BufRead, Write};
use std::sync::Arc;

use tracing::{debug, info};

use crate::command::Command;
use crate::error::{MonitorError, Result};
use crate::monitor::Monitor;
use crate::response::Response;

/// The only protocol version this helper speaks.
pub const PROTOCOL_VERSION: u32 = 1;

const LINK_UNSUPPORTED: &str = "link following is not supported, please disable this option";

/// Where the session is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// Reading top-level commands.
    TopLevel,

    /// Between `START` and its `DONE`.
    Scanning,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The client closed its end of the input.
    InputClosed,

    /// The process was asked to stop.
    Interrupted,

    /// The client sent something the protocol does not allow.
    ProtocolError,
}

impl Exit {
    /// Process exit status for this outcome.
    pub fn code(self) -> i32 {
        match self {
            Self::InputClosed | Self::Interrupted => 0,
            Self::ProtocolError => 1,
        }
    }
}

/// What to do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,

    /// Stop reading.
    Exit(Exit),
}

/// One client session over a line-oriented input.
///
/// Dropping the session stops every replica it started.
pub struct Session<W: Write + Send + 'static> {
    monitor: Arc<Monitor<W>>,
    state: ProtocolState,
}

impl<W: Write + Send + 'static> Session<W> {
    /// Create a session at the top level.
    pub fn new(monitor: Arc<Monitor<W>>) -> Self {
        Self {
            monitor,
            state: ProtocolState::TopLevel,
        }
    }

    /// The shared monitor.
    pub fn monitor(&self) -> &Arc<Monitor<W>> {
        &self.monitor
    }

    /// Current protocol state.
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Handle lines from `input` until it closes or the protocol fails.
    ///
    /// A line that is not valid UTF-8 cannot name a command and is answered
    /// like any other unknown line.
    pub fn run<R: BufRead>(&mut self, mut input: R) -> Result<Exit> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                info!("Input closed");
                return Ok(Exit::InputClosed);
            }
            let raw = buf.strip_suffix(b"\n").unwrap_or(&buf);
            let line = String::from_utf8_lossy(raw);
            if let Flow::Exit(exit) = self.dispatch(&line)? {
                info!(?exit, "Session ended");
                return Ok(exit);
            }
        }
    }

    /// Handle a single input line.
    pub fn dispatch(&mut self, line: &str) -> Result<Flow> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let command = Command::parse(line);
        debug!(state = ?self.state, ?command, "Received line");

        if !command.is_wait() {
            self.monitor.disarm();
        }

        match self.state {
            ProtocolState::TopLevel => self.dispatch_top_level(line, command),
            ProtocolState::Scanning => self.dispatch_scanning(line, command),
        }
    }

    fn dispatch_top_level(&mut self, line: &str, command: Command) -> Result<Flow> {
        match command {
            Command::Version(version) => {
                if version == PROTOCOL_VERSION.to_string() {
                    self.monitor.send(&Response::Version(version))?;
                } else {
                    self.monitor
                        .send(&Response::Error(format!("Unknown version: {line}")))?;
                }
            }
            Command::Start { hash, fspath, path } => {
                if let Some(path) = &path {
                    debug!(hash = %hash, path = %path, "Scan limited to sub-path, watching whole replica");
                }
                match self.monitor.start_replica(&hash, &fspath) {
                    Ok(_) => {}
                    Err(MonitorError::Watch(e)) => {
                        let message = format!("cannot watch {}: {e}", fspath.display());
                        self.monitor.send(&Response::Error(message))?;
                        return Ok(Flow::Exit(Exit::ProtocolError));
                    }
                    Err(e) => return Err(e),
                }
                self.monitor.send(&Response::Ok)?;
                self.state = ProtocolState::Scanning;
            }
            Command::Changes(hash) => {
                self.monitor.send_changes(&hash)?;
            }
            Command::Wait(hash) => {
                self.monitor.wait(&hash)?;
            }
            Command::Reset(hash) => {
                self.monitor.reset_replica(&hash);
            }
            Command::Debug => {
                debug!("DEBUG received; verbosity follows the configured log filter");
            }
            Command::Dir(_) | Command::Link(_) | Command::Done | Command::Unknown(_) => {
                return self.unknown(line);
            }
        }
        Ok(Flow::Continue)
    }

    fn dispatch_scanning(&mut self, line: &str, command: Command) -> Result<Flow> {
        match command {
            Command::Dir(path) => {
                debug!(?path, "Directory scan acknowledged");
                self.monitor.send(&Response::Ok)?;
            }
            Command::Link(path) => {
                debug!(path = %path, "Rejecting link");
                self.monitor
                    .send(&Response::Error(LINK_UNSUPPORTED.to_string()))?;
            }
            Command::Done => {
                self.state = ProtocolState::TopLevel;
            }
            _ => return self.unknown(line),
        }
        Ok(Flow::Continue)
    }

    fn unknown(&self, line: &str) -> Result<Flow> {
        self.monitor
            .send(&Response::Error(format!("Unknown command: {line}")))?;
        Ok(Flow::Exit(Exit::ProtocolError))
    }
}

impl<W: Write + Send + 'static> Drop for Session<W> {
    fn drop(&mut self) {
        self.monitor.shutdown();
    }
}
