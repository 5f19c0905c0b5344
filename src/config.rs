//! Configuration for the synchronization runtime.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `BUFSYNC_` and use double
//! underscores to separate nested levels:
//! - `BUFSYNC_POLL_INTERVAL_MS=5000` sets `poll_interval_ms`
//! - `BUFSYNC_LOGGING__DEFAULT=debug` sets `logging.default`
//!
//! Host-scope precedence (workspace vs global) is an external concern and
//! stays behind the [`ConfigStore`] trait; the core only ever reads an
//! effective snapshot and writes to a preferred scope.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::time::Duration;

use crate::watcher::SyncError;

/// Accepted range for the poll interval, milliseconds.
pub const POLL_INTERVAL_RANGE_MS: (u64, u64) = (250, 60_000);
/// Accepted range for the debounce window, milliseconds.
pub const DEBOUNCE_RANGE_MS: (u64, u64) = (50, 5_000);

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Master switch for the whole runtime.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pattern the primary watcher matches events against.
    #[serde(default = "default_glob")]
    pub glob: String,

    /// Prompt when a watched file changes under a dirty buffer.
    /// When false, such changes are dropped silently.
    #[serde(default = "default_true")]
    pub notify_on_dirty: bool,

    /// Allow the fallback reload path to focus an unfocused document.
    #[serde(default = "default_false")]
    pub steal_focus_on_reload: bool,

    /// Poll sweep cadence, clamped to [250, 60000].
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Minimum spacing between accepted events per file, clamped to [50, 5000].
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Raise the default log level to debug.
    #[serde(default = "default_false")]
    pub debug_logs: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `arbiter = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_glob() -> String {
    "**/*".to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            glob: default_glob(),
            notify_on_dirty: true,
            steal_focus_on_reload: false,
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
            debug_logs: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

fn clamp_ms(value: u64, range: (u64, u64), what: &str) -> u64 {
    let clamped = value.clamp(range.0, range.1);
    if clamped != value {
        // Out-of-range values are accepted silently; the clamp is only
        // visible at debug level.
        tracing::debug!("[config] {what} {value}ms clamped to {clamped}ms");
    }
    clamped
}

impl Settings {
    /// Effective poll interval, clamped.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(clamp_ms(
            self.poll_interval_ms,
            POLL_INTERVAL_RANGE_MS,
            "poll interval",
        ))
    }

    /// Effective debounce window, clamped.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(clamp_ms(self.debounce_ms, DEBOUNCE_RANGE_MS, "debounce"))
    }

    /// Load configuration from all sources.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(".bufsync/settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, layered under env vars.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("BUFSYNC_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".") // Double underscore becomes dot
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Write the settings back out as TOML, creating parent directories.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), SyncError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::ConfigUpdate {
                reason: format!("create {}: {e}", parent.display()),
            })?;
        }
        let rendered = toml::to_string_pretty(self).map_err(|e| SyncError::ConfigUpdate {
            reason: e.to_string(),
        })?;
        std::fs::write(path, rendered).map_err(|e| SyncError::ConfigUpdate {
            reason: format!("write {}: {e}", path.display()),
        })
    }

    /// Find the workspace config by walking ancestors for a `.bufsync` dir.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".bufsync");
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }
}

/// Which scope a setting is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Workspace,
    Global,
}

/// Where the `enabled` flag holds an explicit value, per scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnabledInspection {
    pub workspace: Option<bool>,
    pub global: Option<bool>,
}

/// Abstract host configuration store.
///
/// The host resolves scope precedence; the core reads effective snapshots
/// (one per arbiter decision) and writes to a preferred scope.
pub trait ConfigStore: Send + Sync {
    /// Read-only snapshot of the effective configuration.
    fn effective(&self) -> Settings;

    /// Where `enabled` currently holds an explicit value.
    fn inspect_enabled(&self) -> EnabledInspection;

    /// Write `enabled` at the given scope.
    fn set_enabled(&self, scope: ConfigScope, value: bool) -> Result<(), SyncError>;

    /// Whether a workspace is currently open.
    fn has_workspace(&self) -> bool;
}

/// In-memory [`ConfigStore`] with workspace-over-global precedence for the
/// `enabled` flag. Used by embedders without a host config surface, and by
/// the test suites.
pub struct MemoryConfigStore {
    base: Mutex<Settings>,
    workspace_enabled: Mutex<Option<bool>>,
    global_enabled: Mutex<Option<bool>>,
    workspace_open: bool,
}

impl MemoryConfigStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            base: Mutex::new(settings),
            workspace_enabled: Mutex::new(None),
            global_enabled: Mutex::new(None),
            workspace_open: true,
        }
    }

    pub fn without_workspace(mut self) -> Self {
        self.workspace_open = false;
        self
    }

    /// Mutate the base settings (glob, intervals, policies).
    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.base.lock());
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn effective(&self) -> Settings {
        let mut settings = self.base.lock().clone();
        let enabled = (*self.workspace_enabled.lock()).or(*self.global_enabled.lock());
        if let Some(enabled) = enabled {
            settings.enabled = enabled;
        }
        settings
    }

    fn inspect_enabled(&self) -> EnabledInspection {
        EnabledInspection {
            workspace: *self.workspace_enabled.lock(),
            global: *self.global_enabled.lock(),
        }
    }

    fn set_enabled(&self, scope: ConfigScope, value: bool) -> Result<(), SyncError> {
        match scope {
            ConfigScope::Workspace => *self.workspace_enabled.lock() = Some(value),
            ConfigScope::Global => *self.global_enabled.lock() = Some(value),
        }
        Ok(())
    }

    fn has_workspace(&self) -> bool {
        self.workspace_open
    }
}
