//! Error types for the synchronization runtime.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher and reload operations.
///
/// Nothing here is fatal to the running system: callers log and degrade
/// (a file may simply not get watched, or an event may be dropped).
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Revert failed for {path}: {reason}")]
    RevertFailed { path: PathBuf, reason: String },

    #[error("Host operation failed: {reason}")]
    Host { reason: String },

    #[error("Failed to update configuration: {reason}")]
    ConfigUpdate { reason: String },
}

impl From<notify::Error> for SyncError {
    fn from(e: notify::Error) -> Self {
        SyncError::InitFailed {
            reason: e.to_string(),
        }
    }
}
