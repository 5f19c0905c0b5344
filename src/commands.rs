//! Host-exposed commands.

use crate::config::{ConfigScope, ConfigStore};
use crate::host::HostEditor;
use crate::watcher::{ReloadExecutor, SyncError};

/// Reload the currently focused document from disk, unconditionally.
///
/// Bypasses the dirty-check policy entirely: this is the user asking for
/// a revert. Going through the executor refreshes the tracked mtime, so
/// the next poll sweep does not re-fire on the freshly reverted file.
pub async fn reload_active_file(
    host: &dyn HostEditor,
    executor: &ReloadExecutor,
) -> Result<(), SyncError> {
    match host.active_document().await {
        Some(path) => executor.force_reload(&path).await,
        None => Err(SyncError::Host {
            reason: "no active editor".to_string(),
        }),
    }
}

/// Flip the enabled setting at whichever scope currently holds an
/// explicit value, preferring workspace scope. With no explicit value
/// anywhere, writes to workspace scope when a workspace is open,
/// otherwise global.
///
/// Returns the new value.
pub fn toggle_enabled(config: &dyn ConfigStore) -> Result<bool, SyncError> {
    let inspection = config.inspect_enabled();
    let scope = if inspection.workspace.is_some() {
        ConfigScope::Workspace
    } else if inspection.global.is_some() {
        ConfigScope::Global
    } else if config.has_workspace() {
        ConfigScope::Workspace
    } else {
        ConfigScope::Global
    };

    let next = !config.effective().enabled;
    config.set_enabled(scope, next)?;
    crate::log_event!("commands", "toggled", "enabled = {next} ({scope:?})");
    Ok(next)
}
