//! Per-file tracking state: known mtimes, debounce and cooldown stamps,
//! and the in-flight evaluation flag.
//!
//! The tracked-file table lives here and is reachable only through this
//! interface. The arbiter and synchronizer never touch the map directly,
//! so an entry's four fields always drop together when a file is
//! forgotten.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

use super::path_key::PathKey;

/// Per-file record, created lazily on first observation.
#[derive(Debug, Default)]
struct TrackedFile {
    last_known_mtime: Option<SystemTime>,
    last_event_at: Option<Instant>,
    last_dirty_notify_at: Option<Instant>,
    in_flight: bool,
}

/// Store of per-file synchronization state keyed by normalized path.
#[derive(Debug, Default)]
pub struct FileTracker {
    files: Mutex<HashMap<PathKey, TrackedFile>>,
}

impl FileTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stat a file's modification time.
    ///
    /// Missing or unreadable files are "no signal", never an error.
    pub fn read_mtime(path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path)
            .ok()
            .and_then(|meta| meta.modified().ok())
    }

    pub fn known_mtime(&self, key: &PathKey) -> Option<SystemTime> {
        self.files.lock().get(key).and_then(|f| f.last_known_mtime)
    }

    pub fn record_mtime(&self, key: &PathKey, mtime: SystemTime) {
        self.files
            .lock()
            .entry(key.clone())
            .or_default()
            .last_known_mtime = Some(mtime);
    }

    /// Record a mtime only if none is known yet, so the first observation
    /// of a file does not read as a change.
    pub fn seed_mtime(&self, key: &PathKey, mtime: SystemTime) {
        let mut files = self.files.lock();
        let entry = files.entry(key.clone()).or_default();
        if entry.last_known_mtime.is_none() {
            entry.last_known_mtime = Some(mtime);
        }
    }

    /// Debounce gate: accept the event if the last accepted event for this
    /// key is at least `window` old, recording now as the new stamp.
    ///
    /// The stamp is recorded on acceptance regardless of what the
    /// evaluation later decides, so bursts are suppressed per time window,
    /// not per outcome.
    pub fn accept_event(&self, key: &PathKey, window: Duration) -> bool {
        let now = Instant::now();
        let mut files = self.files.lock();
        let entry = files.entry(key.clone()).or_default();

        if let Some(last) = entry.last_event_at {
            if now.duration_since(last) < window {
                return false;
            }
        }
        entry.last_event_at = Some(now);
        true
    }

    /// Mark an evaluation in flight for this key.
    ///
    /// Returns `None` when one is already running. The guard clears the
    /// flag when dropped, which covers every exit path of the caller.
    pub fn begin_evaluation(self: &Arc<Self>, key: &PathKey) -> Option<InFlightGuard> {
        let mut files = self.files.lock();
        let entry = files.entry(key.clone()).or_default();
        if entry.in_flight {
            return None;
        }
        entry.in_flight = true;
        Some(InFlightGuard {
            tracker: Arc::clone(self),
            key: key.clone(),
        })
    }

    /// Rate limit for dirty-conflict prompts; same record-on-accept shape
    /// as the debounce gate.
    pub fn allow_dirty_notice(&self, key: &PathKey, cooldown: Duration) -> bool {
        let now = Instant::now();
        let mut files = self.files.lock();
        let entry = files.entry(key.clone()).or_default();

        if let Some(last) = entry.last_dirty_notify_at {
            if now.duration_since(last) < cooldown {
                return false;
            }
        }
        entry.last_dirty_notify_at = Some(now);
        true
    }

    /// Drop all state for a key (document closed).
    pub fn forget(&self, key: &PathKey) {
        self.files.lock().remove(key);
    }

    /// Drop a key's entry unless it holds a known mtime.
    ///
    /// Signals for files that never resolve to an open document leave
    /// only timing stamps behind; without this the table grows by one
    /// entry per touched workspace file for the life of the session.
    pub fn forget_if_untracked(&self, key: &PathKey) {
        let mut files = self.files.lock();
        if let Some(entry) = files.get(key) {
            if entry.last_known_mtime.is_none() {
                files.remove(key);
            }
        }
    }

    /// Drop all tracked state (runtime disabled).
    pub fn clear(&self) {
        self.files.lock().clear();
    }

    pub fn tracked_count(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_in_flight(&self, key: &PathKey) -> bool {
        self.files.lock().get(key).is_some_and(|f| f.in_flight)
    }
}

/// Clears the in-flight flag for one key when dropped.
#[must_use = "dropping the guard ends the evaluation"]
pub struct InFlightGuard {
    tracker: Arc<FileTracker>,
    key: PathKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(entry) = self.tracker.files.lock().get_mut(&self.key) {
            entry.in_flight = false;
        }
    }
}
