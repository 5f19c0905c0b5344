//! bufsync keeps open editor buffers synchronized with their files on
//! disk, reloading a buffer when the file changes externally while never
//! clobbering unsaved local edits.

pub mod commands;
pub mod config;
pub mod host;
pub mod logging;
pub mod watcher;

pub use config::{ConfigScope, ConfigStore, EnabledInspection, MemoryConfigStore, Settings};
pub use host::{DocUri, DocumentEvent, HostEditor, PromptChoice};
pub use watcher::{
    ChangeArbiter, DropReason, FileTracker, HostEvent, Outcome, PathKey, RawSignal,
    ReloadExecutor, Runtime, RuntimeState, RuntimeStats, SignalSource, SyncError, SyncRequest,
    WatcherSync,
};
