//! Buffer refresh against the host editor.
//!
//! Layered strategy: revert-by-resource first (no focus needed), then a
//! focus-based fallback gated by the focus-stealing policy. The automatic
//! path re-checks dirtiness immediately before the destructive operation;
//! the forced path is reserved for explicit user choices.

use std::path::Path;
use std::sync::Arc;

use crate::config::ConfigStore;
use crate::host::HostEditor;

use super::error::SyncError;
use super::path_key::PathKey;
use super::tracker::FileTracker;

pub struct ReloadExecutor {
    host: Arc<dyn HostEditor>,
    config: Arc<dyn ConfigStore>,
    tracker: Arc<FileTracker>,
}

impl ReloadExecutor {
    pub fn new(
        host: Arc<dyn HostEditor>,
        config: Arc<dyn ConfigStore>,
        tracker: Arc<FileTracker>,
    ) -> Self {
        Self {
            host,
            config,
            tracker,
        }
    }

    /// Reload an open, non-dirty document from disk.
    ///
    /// Returns whether a reload occurred. A dirty document is never
    /// reverted on this path.
    pub async fn reload_if_clean(&self, path: &Path) -> bool {
        let key = PathKey::normalize(path);

        match self.host.revert_by_resource(path).await {
            Ok(()) => {
                self.refresh_mtime(&key, path);
                crate::debug_event!("reload", "reverted by resource", "{key}");
                return true;
            }
            Err(e) => {
                // Not fatal: fall through to the focus-based path.
                crate::debug_event!("reload", "revert by resource unavailable", "{e}");
            }
        }

        let focused = self.is_focused(&key).await;
        if !focused {
            if !self.config.effective().steal_focus_on_reload {
                crate::debug_event!("reload", "skipped", "{key} unfocused, focus stealing off");
                return false;
            }
            if let Err(e) = self.host.focus_document(path).await {
                tracing::warn!("[reload] failed to focus {}: {e}", path.display());
                return false;
            }
        }

        // A concurrent edit may have landed while focusing.
        if self.host.is_dirty(&key).await {
            crate::debug_event!("reload", "turned dirty before revert", "{key}");
            return false;
        }

        match self.host.revert_active_editor().await {
            Ok(()) => {
                self.refresh_mtime(&key, path);
                crate::log_event!("reload", "reverted", "{key}");
                true
            }
            Err(e) => {
                tracing::warn!("[reload] revert failed for {}: {e}", path.display());
                false
            }
        }
    }

    /// Revert without the dirty re-check.
    ///
    /// Used when the user explicitly chose to discard local edits, and by
    /// the reload-active-file command.
    pub async fn force_reload(&self, path: &Path) -> Result<(), SyncError> {
        let key = PathKey::normalize(path);

        match self.host.revert_by_resource(path).await {
            Ok(()) => {
                self.refresh_mtime(&key, path);
                return Ok(());
            }
            Err(e) => {
                crate::debug_event!("reload", "revert by resource unavailable", "{e}");
            }
        }

        if !self.is_focused(&key).await {
            self.host.focus_document(path).await?;
        }
        self.host.revert_active_editor().await?;
        self.refresh_mtime(&key, path);
        Ok(())
    }

    async fn is_focused(&self, key: &PathKey) -> bool {
        self.host
            .active_document()
            .await
            .is_some_and(|active| PathKey::normalize(&active) == *key)
    }

    fn refresh_mtime(&self, key: &PathKey, path: &Path) {
        if let Some(mtime) = FileTracker::read_mtime(path) {
            self.tracker.record_mtime(key, mtime);
        }
    }
}
