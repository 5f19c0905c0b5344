//! Watcher set synchronization.
//!
//! Reconciles per-file native watcher handles against the current set of
//! open documents. Requests drain through a single worker task, so
//! reconciliations run strictly in order and never race the handle map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{EventKind, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::host::{DocUri, HostEditor};

use super::path_key::PathKey;
use super::tracker::FileTracker;
use super::{RawSignal, SignalSource};

/// One native watcher pinned to a single open file. Dropping the handle
/// detaches the watcher.
struct ExternalWatcher {
    _watcher: notify::RecommendedWatcher,
}

/// Requests processed by the synchronizer worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRequest {
    /// Align handles with the current open-document set.
    Reconcile,
    /// Drop every handle and all tracked state (disable path).
    Clear,
}

/// Front end of the serialized reconciliation queue.
pub struct WatcherSync {
    tx: mpsc::UnboundedSender<SyncRequest>,
    handles: Arc<Mutex<HashMap<PathKey, ExternalWatcher>>>,
}

impl WatcherSync {
    /// Spawn the worker task and return the queue front end.
    pub fn spawn(
        host: Arc<dyn HostEditor>,
        tracker: Arc<FileTracker>,
        signal_tx: mpsc::Sender<RawSignal>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handles: Arc<Mutex<HashMap<PathKey, ExternalWatcher>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let worker_handles = handles.clone();
        tokio::spawn(async move {
            // One request at a time: each reconciliation completes
            // (success or failure) before the next begins.
            while let Some(request) = rx.recv().await {
                match request {
                    SyncRequest::Reconcile => {
                        reconcile(&host, &tracker, &worker_handles, &signal_tx).await;
                    }
                    SyncRequest::Clear => {
                        worker_handles.lock().clear();
                        tracker.clear();
                        crate::debug_event!("sync", "cleared all per-file watchers");
                    }
                }
            }
        });

        Self { tx, handles }
    }

    /// Queue a request behind any in-progress one.
    pub fn request(&self, request: SyncRequest) {
        // The worker lives as long as the runtime; a send failure means
        // shutdown is already underway.
        let _ = self.tx.send(request);
    }

    pub fn handle_count(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn watched_keys(&self) -> Vec<PathKey> {
        self.handles.lock().keys().cloned().collect()
    }
}

/// One reconciliation pass: detach stale handles, attach missing ones.
async fn reconcile(
    host: &Arc<dyn HostEditor>,
    tracker: &Arc<FileTracker>,
    handles: &Arc<Mutex<HashMap<PathKey, ExternalWatcher>>>,
    signal_tx: &mpsc::Sender<RawSignal>,
) {
    let open: HashMap<PathKey, PathBuf> = host
        .open_documents()
        .await
        .into_iter()
        .filter_map(|uri| {
            uri.as_file()
                .map(|p| (PathKey::normalize(p), p.to_path_buf()))
        })
        .collect();

    // Handles whose document closed go first, dropping their tracked
    // state with them.
    let stale: Vec<PathKey> = handles
        .lock()
        .keys()
        .filter(|key| !open.contains_key(*key))
        .cloned()
        .collect();
    for key in stale {
        handles.lock().remove(&key);
        tracker.forget(&key);
        crate::debug_event!("sync", "detached", "{key}");
    }

    // Attach watchers for newly open documents. A failed attach skips
    // that file, not the rest of the batch.
    for (key, path) in open {
        if handles.lock().contains_key(&key) {
            continue;
        }

        if let Some(mtime) = FileTracker::read_mtime(&path) {
            tracker.seed_mtime(&key, mtime);
        }

        match attach(&path, signal_tx.clone()) {
            Ok(watcher) => {
                crate::debug_event!("sync", "attached", "{key}");
                handles
                    .lock()
                    .insert(key, ExternalWatcher { _watcher: watcher });
            }
            Err(e) => {
                tracing::warn!("[sync] failed to watch {}: {e}", path.display());
            }
        }
    }
}

/// Attach a native watcher to a single file.
fn attach(
    path: &Path,
    signal_tx: mpsc::Sender<RawSignal>,
) -> Result<notify::RecommendedWatcher, notify::Error> {
    let signal_path = path.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    let _ = signal_tx.blocking_send(RawSignal {
                        uri: DocUri::File(signal_path.clone()),
                        source: SignalSource::PerFile,
                    });
                }
            }
            Err(e) => {
                // Logged only; the watcher is not recreated.
                tracing::warn!("[sync] watcher error for {}: {e}", signal_path.display());
            }
        }
    })?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
