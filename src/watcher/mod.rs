//! Disk-to-buffer synchronization runtime.
//!
//! Keeps open editor buffers aligned with their files on disk without
//! clobbering unsaved local edits.
//!
//! # Architecture
//!
//! ```text
//! Signal sources                     Decision core
//!
//! Primary glob watcher ──┐
//! Per-file watchers ─────┼──> RawSignal ──> ChangeArbiter ──> ReloadExecutor
//! Poll sweep ────────────┘                     │                  │
//!                                         FileTracker <───────────┘
//!
//! WatcherSync reconciles per-file handles against open documents;
//! Runtime owns lifecycle and restarts sources on config changes.
//! ```

mod arbiter;
mod error;
mod path_key;
mod poll;
mod reload;
mod runtime;
mod sync;
mod tracker;

pub use arbiter::{ChangeArbiter, DropReason, Outcome};
pub use error::SyncError;
pub use path_key::PathKey;
pub use reload::ReloadExecutor;
pub use runtime::{HostEvent, Runtime, RuntimeState, RuntimeStats};
pub use sync::{SyncRequest, WatcherSync};
pub use tracker::{FileTracker, InFlightGuard};

use crate::host::DocUri;

/// Where a raw change signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    /// The primary glob watcher over the workspace.
    Glob,
    /// A per-file native watcher.
    PerFile,
    /// The fallback poll sweep.
    Poll,
}

/// A "file possibly changed" event from any signal source.
#[derive(Debug, Clone)]
pub struct RawSignal {
    pub uri: DocUri,
    pub source: SignalSource,
}
