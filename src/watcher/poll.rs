//! Fallback poll sweep over open documents.
//!
//! Periodic mtime comparison catches changes the push-based watchers
//! miss (network mounts, editors that replace files atomically, missed
//! native events). Reliability fallback, not the primary signal path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};

use crate::host::{DocUri, HostEditor};

use super::path_key::PathKey;
use super::tracker::FileTracker;
use super::{RawSignal, SignalSource};

/// Spawn the poll loop task. Aborting the handle stops the timer.
pub(crate) fn spawn(
    host: Arc<dyn HostEditor>,
    tracker: Arc<FileTracker>,
    signal_tx: mpsc::Sender<RawSignal>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let sweeping = Arc::new(AtomicBool::new(false));
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            // Non-overlap guard: a tick that fires while the previous
            // sweep is still running is skipped entirely, not queued.
            if sweeping.swap(true, Ordering::SeqCst) {
                crate::debug_event!("poll", "sweep still running, tick skipped");
                continue;
            }

            let host = host.clone();
            let tracker = tracker.clone();
            let signal_tx = signal_tx.clone();
            let guard = sweeping.clone();
            tokio::spawn(async move {
                sweep(&host, &tracker, &signal_tx).await;
                guard.store(false, Ordering::SeqCst);
            });
        }
    })
}

/// One sweep: stat every open file-backed document and signal the ones
/// whose on-disk mtime moved past the last known one.
async fn sweep(
    host: &Arc<dyn HostEditor>,
    tracker: &Arc<FileTracker>,
    signal_tx: &mpsc::Sender<RawSignal>,
) {
    for uri in host.open_documents().await {
        let Some(path) = uri.as_file() else { continue };
        let key = PathKey::normalize(path);

        // Stat failure is "no signal", not an error.
        let Some(mtime) = FileTracker::read_mtime(path) else {
            continue;
        };

        match tracker.known_mtime(&key) {
            // First observation seeds the baseline instead of firing a
            // spurious "changed".
            None => tracker.seed_mtime(&key, mtime),
            Some(known) if mtime > known => {
                crate::debug_event!("poll", "mtime advanced", "{key}");
                let _ = signal_tx
                    .send(RawSignal {
                        uri: DocUri::File(path.to_path_buf()),
                        source: SignalSource::Poll,
                    })
                    .await;
            }
            Some(_) => {}
        }
    }
}
