//! Host editor collaborator interface.
//!
//! The runtime never talks to a concrete editor. Everything it needs from
//! the host (open-document enumeration, dirty-state queries, revert and
//! focus operations, the dirty-conflict prompt) goes through this trait,
//! so the decision core stays testable against a mock.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::watcher::{PathKey, SyncError};

/// Document identity as the host reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocUri {
    /// A document backed by a file on disk.
    File(PathBuf),
    /// Any non-file-backed document (untitled buffers, virtual schemes).
    /// These are never reloaded.
    Other(String),
}

impl DocUri {
    pub fn as_file(&self) -> Option<&Path> {
        match self {
            DocUri::File(p) => Some(p),
            DocUri::Other(_) => None,
        }
    }
}

/// User response to a dirty-conflict prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    /// Discard local edits and reload from disk.
    Reload,
    /// Keep the buffer as it is.
    Ignore,
}

/// Document lifecycle events pushed by the host into the runtime loop.
#[derive(Debug, Clone)]
pub enum DocumentEvent {
    Opened(DocUri),
    Closed(DocUri),
    /// A buffer was written to disk. Used to refresh the known mtime so
    /// the system's own save does not read back as an external change.
    Saved(PathBuf),
}

/// Interface onto the host editor's document model.
#[async_trait]
pub trait HostEditor: Send + Sync {
    /// Enumerate currently open documents.
    async fn open_documents(&self) -> Vec<DocUri>;

    /// Resolve an open document by normalized key, returning its path.
    async fn find_document(&self, key: &PathKey) -> Option<PathBuf>;

    /// Whether the document has unsaved local modifications.
    async fn is_dirty(&self, key: &PathKey) -> bool;

    /// Path of the currently focused editor, if any.
    async fn active_document(&self) -> Option<PathBuf>;

    /// Revert a document to its on-disk content without focusing it.
    ///
    /// Hosts that cannot revert by resource return an error; the reload
    /// executor falls through to the focus-based path.
    async fn revert_by_resource(&self, path: &Path) -> Result<(), SyncError>;

    /// Revert the currently focused editor.
    async fn revert_active_editor(&self) -> Result<(), SyncError>;

    /// Bring a document into focus.
    async fn focus_document(&self, path: &Path) -> Result<(), SyncError>;

    /// Modal choice between discarding local edits and keeping them.
    /// Resolves only when the user answers.
    async fn prompt_dirty_conflict(&self, path: &Path) -> PromptChoice;

    /// Short status text for the host's indicator surface. Rendering is
    /// the host's concern; the default ignores it.
    fn set_status(&self, _text: &str) {}
}
