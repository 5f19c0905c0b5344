//! Shared mock host editor for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use bufsync::{DocUri, HostEditor, PathKey, PromptChoice, SyncError};

struct MockDoc {
    path: PathBuf,
    dirty: bool,
}

/// In-memory host editor with scriptable prompts and revert support.
pub struct MockHost {
    docs: Mutex<HashMap<PathKey, MockDoc>>,
    active: Mutex<Option<PathBuf>>,
    revert_by_resource_supported: AtomicBool,
    reverts: Mutex<Vec<PathBuf>>,
    prompt_response: Mutex<PromptChoice>,
    prompt_count: AtomicUsize,
    prompt_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            docs: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            revert_by_resource_supported: AtomicBool::new(true),
            reverts: Mutex::new(Vec::new()),
            prompt_response: Mutex::new(PromptChoice::Ignore),
            prompt_count: AtomicUsize::new(0),
            prompt_gate: Mutex::new(None),
        })
    }

    pub fn open(&self, path: impl AsRef<Path>, dirty: bool) {
        let path = path.as_ref().to_path_buf();
        let key = PathKey::normalize(&path);
        self.docs.lock().insert(key, MockDoc { path, dirty });
    }

    pub fn close(&self, path: impl AsRef<Path>) {
        let key = PathKey::normalize(path.as_ref());
        self.docs.lock().remove(&key);
    }

    pub fn set_dirty(&self, path: impl AsRef<Path>, dirty: bool) {
        let key = PathKey::normalize(path.as_ref());
        if let Some(doc) = self.docs.lock().get_mut(&key) {
            doc.dirty = dirty;
        }
    }

    pub fn set_active(&self, path: Option<PathBuf>) {
        *self.active.lock() = path;
    }

    pub fn set_revert_by_resource_supported(&self, supported: bool) {
        self.revert_by_resource_supported
            .store(supported, Ordering::SeqCst);
    }

    pub fn set_prompt_response(&self, choice: PromptChoice) {
        *self.prompt_response.lock() = choice;
    }

    /// Make prompts block until the returned handle is notified, so tests
    /// can hold a prompt open while more signals arrive.
    pub fn gate_prompts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.prompt_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn revert_count(&self) -> usize {
        self.reverts.lock().len()
    }

    pub fn reverted_paths(&self) -> Vec<PathBuf> {
        self.reverts.lock().clone()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompt_count.load(Ordering::SeqCst)
    }

    fn record_revert(&self, path: PathBuf) {
        let key = PathKey::normalize(&path);
        if let Some(doc) = self.docs.lock().get_mut(&key) {
            doc.dirty = false;
        }
        self.reverts.lock().push(path);
    }
}

#[async_trait]
impl HostEditor for MockHost {
    async fn open_documents(&self) -> Vec<DocUri> {
        self.docs
            .lock()
            .values()
            .map(|doc| DocUri::File(doc.path.clone()))
            .collect()
    }

    async fn find_document(&self, key: &PathKey) -> Option<PathBuf> {
        self.docs.lock().get(key).map(|doc| doc.path.clone())
    }

    async fn is_dirty(&self, key: &PathKey) -> bool {
        self.docs.lock().get(key).is_some_and(|doc| doc.dirty)
    }

    async fn active_document(&self) -> Option<PathBuf> {
        self.active.lock().clone()
    }

    async fn revert_by_resource(&self, path: &Path) -> Result<(), SyncError> {
        if !self.revert_by_resource_supported.load(Ordering::SeqCst) {
            return Err(SyncError::RevertFailed {
                path: path.to_path_buf(),
                reason: "revert by resource not supported".to_string(),
            });
        }
        self.record_revert(path.to_path_buf());
        Ok(())
    }

    async fn revert_active_editor(&self) -> Result<(), SyncError> {
        let active = self.active.lock().clone();
        match active {
            Some(path) => {
                self.record_revert(path);
                Ok(())
            }
            None => Err(SyncError::Host {
                reason: "no active editor".to_string(),
            }),
        }
    }

    async fn focus_document(&self, path: &Path) -> Result<(), SyncError> {
        *self.active.lock() = Some(path.to_path_buf());
        Ok(())
    }

    async fn prompt_dirty_conflict(&self, _path: &Path) -> PromptChoice {
        self.prompt_count.fetch_add(1, Ordering::SeqCst);
        let gate = self.prompt_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        *self.prompt_response.lock()
    }
}
