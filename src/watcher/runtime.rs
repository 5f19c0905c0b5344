//! Runtime lifecycle: starts and stops every signal source as a unit.
//!
//! Two states, Disabled and Enabled, driven by the resolved `enabled`
//! configuration value. Configuration changes while enabled restart only
//! the pieces whose settings actually changed.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glob::Pattern;
use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::config::ConfigStore;
use crate::host::{DocUri, DocumentEvent, HostEditor};

use super::arbiter::ChangeArbiter;
use super::path_key::PathKey;
use super::poll;
use super::sync::{SyncRequest, WatcherSync};
use super::tracker::FileTracker;
use super::{RawSignal, SignalSource};

/// Host-side inputs to the runtime event loop.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Document(DocumentEvent),
    ConfigChanged,
}

/// Lifecycle state, reported by [`Runtime::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Disabled,
    Enabled,
}

/// Snapshot of runtime observability counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    pub state: RuntimeState,
    /// Times the primary glob watcher has been (re)built.
    pub primary_restarts: u64,
    /// Times the poll timer has been (re)started.
    pub poll_restarts: u64,
    /// Per-file external watcher handles currently attached.
    pub handle_count: usize,
    /// Files with tracked state.
    pub tracked_files: usize,
}

/// The one watcher over the configured glob pattern.
struct PrimaryWatcher {
    pattern: String,
    _watcher: notify::RecommendedWatcher,
}

/// Signal sources owned while enabled.
struct Active {
    primary: Option<PrimaryWatcher>,
    poll: JoinHandle<()>,
    poll_interval: Duration,
}

pub struct Runtime {
    host: Arc<dyn HostEditor>,
    config: Arc<dyn ConfigStore>,
    tracker: Arc<FileTracker>,
    arbiter: Arc<ChangeArbiter>,
    sync: WatcherSync,
    enabled: Arc<AtomicBool>,
    workspace_root: PathBuf,
    signal_tx: mpsc::Sender<RawSignal>,
    signal_rx: Option<mpsc::Receiver<RawSignal>>,
    active: Option<Active>,
    primary_restarts: u64,
    poll_restarts: u64,
}

impl Runtime {
    pub fn new(
        host: Arc<dyn HostEditor>,
        config: Arc<dyn ConfigStore>,
        workspace_root: PathBuf,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(256);
        let tracker = FileTracker::new();
        let enabled = Arc::new(AtomicBool::new(false));
        let sync = WatcherSync::spawn(host.clone(), tracker.clone(), signal_tx.clone());
        let arbiter = Arc::new(ChangeArbiter::new(
            host.clone(),
            config.clone(),
            tracker.clone(),
            enabled.clone(),
        ));

        Self {
            host,
            config,
            tracker,
            arbiter,
            sync,
            enabled,
            workspace_root,
            signal_tx,
            signal_rx: Some(signal_rx),
            active: None,
            primary_restarts: 0,
            poll_restarts: 0,
        }
    }

    /// Resolve the initial state from configuration and start signal
    /// sources accordingly. Nothing persists across restarts.
    pub fn start(&mut self) {
        if self.config.effective().enabled {
            self.enable();
        } else {
            crate::debug_event!("runtime", "starting disabled");
        }
    }

    /// React to a configuration change, restarting only what changed.
    pub fn apply_config(&mut self) {
        let settings = self.config.effective();
        match (self.active.is_some(), settings.enabled) {
            (false, true) => self.enable(),
            (true, false) => self.disable(),
            (false, false) => {}
            (true, true) => {
                let glob_changed = self
                    .active
                    .as_ref()
                    .and_then(|a| a.primary.as_ref())
                    .is_none_or(|p| p.pattern != settings.glob);
                let new_interval = settings.poll_interval();
                let poll_changed = self
                    .active
                    .as_ref()
                    .is_none_or(|a| a.poll_interval != new_interval);

                if glob_changed {
                    let primary = self.start_primary(&settings.glob);
                    if let Some(active) = &mut self.active {
                        active.primary = primary;
                    }
                    crate::log_event!("runtime", "primary watcher restarted", "glob {}", settings.glob);
                }

                if poll_changed {
                    let poll = self.start_poll(new_interval);
                    if let Some(active) = &mut self.active {
                        let old = std::mem::replace(&mut active.poll, poll);
                        old.abort();
                        active.poll_interval = new_interval;
                    }
                    crate::log_event!(
                        "runtime",
                        "poll timer restarted",
                        "{}ms",
                        new_interval.as_millis()
                    );
                }

                self.sync.request(SyncRequest::Reconcile);
            }
        }
    }

    /// Process one host event. Called from the run loop; also usable
    /// directly by embedders that drive their own loop.
    pub fn handle_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Document(DocumentEvent::Saved(path)) => {
                // Our own save must not read back as an external change.
                // While disabled, nothing is tracked, so there is no echo
                // to suppress and no entry to create.
                if self.enabled.load(Ordering::SeqCst) {
                    let key = PathKey::normalize(&path);
                    if let Some(mtime) = FileTracker::read_mtime(&path) {
                        self.tracker.record_mtime(&key, mtime);
                    }
                }
            }
            HostEvent::Document(_) => {
                if self.enabled.load(Ordering::SeqCst) {
                    self.sync.request(SyncRequest::Reconcile);
                }
            }
            HostEvent::ConfigChanged => self.apply_config(),
        }
    }

    /// Drive the runtime until the host event channel closes.
    ///
    /// One arbiter evaluation is spawned per raw signal: evaluations for
    /// different keys proceed concurrently, same-key evaluations are
    /// serialized by the in-flight flag.
    pub async fn run(mut self, mut host_events: mpsc::UnboundedReceiver<HostEvent>) {
        self.start();

        let Some(mut signal_rx) = self.signal_rx.take() else {
            return;
        };

        loop {
            tokio::select! {
                Some(signal) = signal_rx.recv() => {
                    let arbiter = self.arbiter.clone();
                    tokio::spawn(async move {
                        arbiter.on_signal(signal).await;
                    });
                }
                event = host_events.recv() => {
                    match event {
                        Some(event) => self.handle_host_event(event),
                        None => break,
                    }
                }
            }
        }

        self.disable();
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            state: if self.active.is_some() {
                RuntimeState::Enabled
            } else {
                RuntimeState::Disabled
            },
            primary_restarts: self.primary_restarts,
            poll_restarts: self.poll_restarts,
            handle_count: self.sync.handle_count(),
            tracked_files: self.tracker.tracked_count(),
        }
    }

    pub fn arbiter(&self) -> Arc<ChangeArbiter> {
        self.arbiter.clone()
    }

    pub fn tracker(&self) -> Arc<FileTracker> {
        self.tracker.clone()
    }

    pub fn synchronizer(&self) -> &WatcherSync {
        &self.sync
    }

    /// Sender for injecting raw signals (used by embedders and tests).
    pub fn signal_sender(&self) -> mpsc::Sender<RawSignal> {
        self.signal_tx.clone()
    }

    fn enable(&mut self) {
        if self.active.is_some() {
            return;
        }
        let settings = self.config.effective();

        let primary = self.start_primary(&settings.glob);
        let poll_interval = settings.poll_interval();
        let poll = self.start_poll(poll_interval);

        self.active = Some(Active {
            primary,
            poll,
            poll_interval,
        });
        self.enabled.store(true, Ordering::SeqCst);
        self.sync.request(SyncRequest::Reconcile);
        self.host.set_status("bufsync: watching");
        crate::log_event!("runtime", "enabled", "glob {}", settings.glob);
    }

    fn disable(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.enabled.store(false, Ordering::SeqCst);
        // Aborting the poll task drops its tick loop and the in-progress
        // sweep guard with it.
        active.poll.abort();
        drop(active.primary);
        self.sync.request(SyncRequest::Clear);
        self.host.set_status("bufsync: off");
        crate::log_event!("runtime", "disabled");
    }

    fn start_poll(&mut self, poll_interval: Duration) -> JoinHandle<()> {
        self.poll_restarts += 1;
        poll::spawn(
            self.host.clone(),
            self.tracker.clone(),
            self.signal_tx.clone(),
            poll_interval,
        )
    }

    /// Build the primary glob watcher over the workspace root.
    ///
    /// Failure degrades to `None` (the poll loop still covers open files)
    /// rather than failing the whole enable.
    fn start_primary(&mut self, glob: &str) -> Option<PrimaryWatcher> {
        let pattern = match Pattern::new(glob) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("[runtime] invalid glob {glob:?}, using default: {e}");
                Pattern::new("**/*").ok()?
            }
        };

        let root = self.workspace_root.clone();
        let signal_tx = self.signal_tx.clone();
        let result = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    ) {
                        return;
                    }
                    for path in event.paths {
                        let relative = path.strip_prefix(&root).unwrap_or(&path);
                        if pattern.matches_path(relative) {
                            let _ = signal_tx.blocking_send(RawSignal {
                                uri: DocUri::File(path.clone()),
                                source: SignalSource::Glob,
                            });
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("[runtime] primary watcher error: {e}");
                }
            }
        });

        let mut watcher = match result {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!("[runtime] failed to create primary watcher: {e}");
                return None;
            }
        };
        if let Err(e) = watcher.watch(&self.workspace_root, RecursiveMode::Recursive) {
            tracing::warn!(
                "[runtime] failed to watch {}: {e}",
                self.workspace_root.display()
            );
            return None;
        }

        self.primary_restarts += 1;
        crate::debug_event!("runtime", "primary watching", "{}", self.workspace_root.display());
        Some(PrimaryWatcher {
            pattern: glob.to_string(),
            _watcher: watcher,
        })
    }
}
