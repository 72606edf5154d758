//! # fsmonitor
//!
//! A helper process that tells a file synchronizer which directories changed.
//! The synchronizer talks to it over a line protocol on stdin/stdout; replica
//! watches report changes from their own threads and may interrupt a waiting
//! client with an unsolicited `CHANGES` line.
//!
//! ```text
//!  stdin ──► Session ──► Monitor ──► ResponseWriter ──► stdout
//!                          ▲
//!  watch threads ──────────┘  (one per replica, same lock)
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod monitor;
pub mod replica;
pub mod response;
pub mod session;
pub mod store;
pub mod wait;

use std::io::{BufRead, Write};
use std::sync::Arc;

use fsmonitor_directory_watcher::DirectoryWatcher;

pub use command::Command;
pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use monitor::Monitor;
pub use response::{Response, ResponseWriter};
pub use session::{Exit, Flow, PROTOCOL_VERSION, ProtocolState, Session};

/// Serve one session with native directory watches until `input` closes.
pub fn serve<R, W>(config: &MonitorConfig, input: R, output: W) -> Result<Exit>
where
    R: BufRead,
    W: Write + Send + 'static,
{
    let monitor = Monitor::new(
        Arc::new(DirectoryWatcher::new()),
        config.watch.clone(),
        output,
    );
    Session::new(monitor).run(input)
}
