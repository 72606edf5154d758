//! # Directory Watcher
//!
//! Recursive directory watches for the fsmonitor helper. Each subscription
//! reports the set of directories whose contents changed, coalesced over a
//! configurable window, to a callback running on the subscription's own
//! worker thread.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Directory Watcher                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  notify watcher ──► worker thread ──► BatchCallback            │
//! │                          │                                      │
//! │                          ▼                                      │
//! │                 ChangeBatch ──► Coalescer                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod coalesce;
pub mod config;
pub mod error;
pub mod event;
pub mod watcher;

pub use coalesce::Coalescer;
pub use config::WatchOptions;
pub use error::{Result, WatcherError};
pub use event::{ChangeBatch, changed_directory};
pub use watcher::{BatchCallback, DirectoryWatcher, Subscription, WatchHandle, WatchService};
