//! Change arbitration: the decision core.
//!
//! Receives raw "file possibly changed" signals from every source and
//! decides, per file, whether to reload silently, prompt the user, or
//! drop the event. Overlapping signals for the same real change collapse
//! to at most one accepted decision per debounce window, and at most one
//! concurrent evaluation per key.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::time::Duration;

use crate::config::ConfigStore;
use crate::host::{HostEditor, PromptChoice};

use super::RawSignal;
use super::path_key::PathKey;
use super::reload::ReloadExecutor;
use super::tracker::FileTracker;

/// Cooldown between dirty-conflict prompts for the same key.
const DIRTY_NOTICE_COOLDOWN: Duration = Duration::from_millis(4000);

/// Why a signal produced no decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Runtime is disabled.
    Disabled,
    /// Not a plain file reference.
    NonFileUri,
    /// Inside the debounce window of the last accepted event.
    Debounced,
    /// An evaluation for this key is already suspended mid-decision.
    InFlight,
    /// No open document for this key; nothing to reload.
    NotOpen,
    /// Document dirty and `notify_on_dirty` is off.
    DirtySilenced,
    /// Document dirty but a prompt fired recently.
    DirtyCooldown,
}

/// Decision produced for one raw signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The buffer was reverted to on-disk content.
    Reloaded,
    /// Clean document, but no reload happened (focus policy, host failure,
    /// or a concurrent edit landed mid-reload).
    Skipped,
    /// The user was prompted; records their choice.
    Prompted(PromptChoice),
    Dropped(DropReason),
}

pub struct ChangeArbiter {
    host: Arc<dyn HostEditor>,
    config: Arc<dyn ConfigStore>,
    tracker: Arc<FileTracker>,
    reload: ReloadExecutor,
    enabled: Arc<AtomicBool>,
}

impl ChangeArbiter {
    pub fn new(
        host: Arc<dyn HostEditor>,
        config: Arc<dyn ConfigStore>,
        tracker: Arc<FileTracker>,
        enabled: Arc<AtomicBool>,
    ) -> Self {
        let reload = ReloadExecutor::new(host.clone(), config.clone(), tracker.clone());
        Self {
            host,
            config,
            tracker,
            reload,
            enabled,
        }
    }

    pub fn reload_executor(&self) -> &ReloadExecutor {
        &self.reload
    }

    /// Evaluate one raw change signal end to end.
    pub async fn on_signal(&self, signal: RawSignal) -> Outcome {
        if !self.enabled.load(Ordering::SeqCst) {
            return Outcome::Dropped(DropReason::Disabled);
        }
        let Some(path) = signal.uri.as_file() else {
            return Outcome::Dropped(DropReason::NonFileUri);
        };
        let key = PathKey::normalize(path);
        let settings = self.config.effective();

        if !self.tracker.accept_event(&key, settings.debounce()) {
            crate::debug_event!("arbiter", "debounced", "{key} ({:?})", signal.source);
            return Outcome::Dropped(DropReason::Debounced);
        }

        let Some(_guard) = self.tracker.begin_evaluation(&key) else {
            crate::debug_event!("arbiter", "already in flight", "{key}");
            return Outcome::Dropped(DropReason::InFlight);
        };

        let Some(doc_path) = self.host.find_document(&key).await else {
            crate::debug_event!("arbiter", "not open", "{key}");
            // Nothing to reload and no watcher state: the debounce stamp
            // alone must not keep the entry alive.
            self.tracker.forget_if_untracked(&key);
            return Outcome::Dropped(DropReason::NotOpen);
        };

        if self.host.is_dirty(&key).await {
            if !settings.notify_on_dirty {
                return Outcome::Dropped(DropReason::DirtySilenced);
            }
            if !self.tracker.allow_dirty_notice(&key, DIRTY_NOTICE_COOLDOWN) {
                return Outcome::Dropped(DropReason::DirtyCooldown);
            }

            crate::log_event!("arbiter", "conflict", "{key} changed on disk with unsaved edits");
            // The in-flight guard is held across this suspension, so no
            // second evaluation can queue a reload while the prompt is open.
            let choice = self.host.prompt_dirty_conflict(&doc_path).await;
            if choice == PromptChoice::Reload {
                if let Err(e) = self.reload.force_reload(&doc_path).await {
                    tracing::warn!("[arbiter] reload after prompt failed: {e}");
                }
            }
            return Outcome::Prompted(choice);
        }

        if self.reload.reload_if_clean(&doc_path).await {
            Outcome::Reloaded
        } else {
            Outcome::Skipped
        }
    }
}
