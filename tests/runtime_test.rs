//! Runtime lifecycle tests: state transitions, partial restarts on
//! config changes, and the end-to-end reload path over a real directory.

mod common;

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep, timeout};

use bufsync::{
    ConfigScope, ConfigStore, DocumentEvent, HostEvent, MemoryConfigStore, Runtime, RuntimeState,
};
use common::MockHost;

async fn settle() {
    sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_enable_disable_reenable_leaks_no_handles() {
    let dir = TempDir::new().unwrap();
    let file_a = dir.path().join("a.txt");
    let file_b = dir.path().join("b.txt");
    fs::write(&file_a, "a").unwrap();
    fs::write(&file_b, "b").unwrap();

    let host = MockHost::new();
    host.open(&file_a, false);
    host.open(&file_b, false);
    let config = Arc::new(MemoryConfigStore::default());
    let mut runtime = Runtime::new(host.clone(), config.clone(), dir.path().to_path_buf());

    runtime.start();
    settle().await;
    let stats = runtime.stats();
    assert_eq!(stats.state, RuntimeState::Enabled);
    assert_eq!(stats.handle_count, 2);
    assert_eq!(stats.primary_restarts, 1);
    assert_eq!(stats.poll_restarts, 1);

    config.set_enabled(ConfigScope::Workspace, false).unwrap();
    runtime.apply_config();
    settle().await;
    let stats = runtime.stats();
    assert_eq!(stats.state, RuntimeState::Disabled);
    assert_eq!(stats.handle_count, 0);
    assert_eq!(stats.tracked_files, 0);

    config.set_enabled(ConfigScope::Workspace, true).unwrap();
    runtime.apply_config();
    settle().await;
    let stats = runtime.stats();
    assert_eq!(stats.state, RuntimeState::Enabled);
    // Handle count after re-enable equals the number of open documents.
    assert_eq!(stats.handle_count, 2);
}

#[tokio::test]
async fn test_start_resolves_disabled_from_config() {
    let dir = TempDir::new().unwrap();
    let host = MockHost::new();
    let config = Arc::new(MemoryConfigStore::default());
    config.set_enabled(ConfigScope::Global, false).unwrap();

    let mut runtime = Runtime::new(host, config, dir.path().to_path_buf());
    runtime.start();
    settle().await;

    let stats = runtime.stats();
    assert_eq!(stats.state, RuntimeState::Disabled);
    assert_eq!(stats.primary_restarts, 0);
    assert_eq!(stats.poll_restarts, 0);
}

#[tokio::test]
async fn test_glob_change_restarts_only_primary_watcher() {
    let dir = TempDir::new().unwrap();
    let host = MockHost::new();
    let config = Arc::new(MemoryConfigStore::default());
    let mut runtime = Runtime::new(host, config.clone(), dir.path().to_path_buf());

    runtime.start();
    settle().await;
    assert_eq!(runtime.stats().primary_restarts, 1);
    assert_eq!(runtime.stats().poll_restarts, 1);

    config.update(|s| s.glob = "**/*.rs".to_string());
    runtime.apply_config();
    settle().await;

    let stats = runtime.stats();
    assert_eq!(stats.primary_restarts, 2);
    // The poll timer was left untouched.
    assert_eq!(stats.poll_restarts, 1);
    assert_eq!(stats.state, RuntimeState::Enabled);
}

#[tokio::test]
async fn test_poll_interval_change_restarts_only_poll_timer() {
    let dir = TempDir::new().unwrap();
    let host = MockHost::new();
    let config = Arc::new(MemoryConfigStore::default());
    let mut runtime = Runtime::new(host, config.clone(), dir.path().to_path_buf());

    runtime.start();
    settle().await;

    config.update(|s| s.poll_interval_ms = 5000);
    runtime.apply_config();
    settle().await;

    let stats = runtime.stats();
    assert_eq!(stats.poll_restarts, 2);
    assert_eq!(stats.primary_restarts, 1);
}

#[tokio::test]
async fn test_unchanged_config_restarts_nothing() {
    let dir = TempDir::new().unwrap();
    let host = MockHost::new();
    let config = Arc::new(MemoryConfigStore::default());
    let mut runtime = Runtime::new(host, config, dir.path().to_path_buf());

    runtime.start();
    settle().await;

    runtime.apply_config();
    settle().await;

    let stats = runtime.stats();
    assert_eq!(stats.primary_restarts, 1);
    assert_eq!(stats.poll_restarts, 1);
}

#[tokio::test]
async fn test_open_event_triggers_reconciliation() {
    let dir = TempDir::new().unwrap();
    let file_a = dir.path().join("a.txt");
    fs::write(&file_a, "a").unwrap();

    let host = MockHost::new();
    let config = Arc::new(MemoryConfigStore::default());
    let mut runtime = Runtime::new(host.clone(), config, dir.path().to_path_buf());
    runtime.start();
    settle().await;
    assert_eq!(runtime.stats().handle_count, 0);

    host.open(&file_a, false);
    runtime.handle_host_event(HostEvent::Document(DocumentEvent::Opened(
        bufsync::DocUri::File(file_a.clone()),
    )));
    settle().await;

    assert_eq!(runtime.stats().handle_count, 1);

    host.close(&file_a);
    runtime.handle_host_event(HostEvent::Document(DocumentEvent::Closed(
        bufsync::DocUri::File(file_a.clone()),
    )));
    settle().await;

    assert_eq!(runtime.stats().handle_count, 0);
}

#[tokio::test]
async fn test_save_event_suppresses_echo() {
    let dir = TempDir::new().unwrap();
    let file_a = dir.path().join("a.txt");
    fs::write(&file_a, "original").unwrap();

    let host = MockHost::new();
    host.open(&file_a, false);
    let config = Arc::new(MemoryConfigStore::default());
    let mut runtime = Runtime::new(host.clone(), config, dir.path().to_path_buf());
    runtime.start();
    settle().await;

    // The host saves the buffer; the runtime records the new mtime so the
    // write is not mistaken for an external change.
    fs::write(&file_a, "saved by us").unwrap();
    runtime.handle_host_event(HostEvent::Document(DocumentEvent::Saved(file_a.clone())));

    let key = bufsync::PathKey::normalize(&file_a);
    let known = runtime.tracker().known_mtime(&key).expect("mtime recorded");
    let on_disk = fs::metadata(&file_a).unwrap().modified().unwrap();
    assert_eq!(known, on_disk);
}

#[tokio::test]
async fn test_save_event_while_disabled_tracks_nothing() {
    let dir = TempDir::new().unwrap();
    let file_a = dir.path().join("a.txt");
    fs::write(&file_a, "a").unwrap();

    let host = MockHost::new();
    host.open(&file_a, false);
    let config = Arc::new(MemoryConfigStore::default());
    config.set_enabled(ConfigScope::Global, false).unwrap();
    let mut runtime = Runtime::new(host, config, dir.path().to_path_buf());
    runtime.start();

    runtime.handle_host_event(HostEvent::Document(DocumentEvent::Saved(file_a.clone())));

    // Disabled means no tracked state, save events included.
    let stats = runtime.stats();
    assert_eq!(stats.state, RuntimeState::Disabled);
    assert_eq!(stats.tracked_files, 0);
}

#[tokio::test]
async fn test_reload_active_file_command_refreshes_known_mtime() {
    let dir = TempDir::new().unwrap();
    let file_a = dir.path().join("a.txt");
    fs::write(&file_a, "original").unwrap();

    let host = MockHost::new();
    host.open(&file_a, true);
    host.set_active(Some(file_a.clone()));
    let config = Arc::new(MemoryConfigStore::default());
    let runtime = Runtime::new(host.clone(), config, dir.path().to_path_buf());

    let arbiter = runtime.arbiter();
    bufsync::commands::reload_active_file(host.as_ref(), arbiter.reload_executor())
        .await
        .unwrap();

    assert_eq!(host.revert_count(), 1);
    // The revert refreshed the known mtime, so the next poll sweep sees
    // no difference and fires nothing.
    let key = bufsync::PathKey::normalize(&file_a);
    let on_disk = fs::metadata(&file_a).unwrap().modified().unwrap();
    assert_eq!(runtime.tracker().known_mtime(&key), Some(on_disk));
}

#[tokio::test]
async fn test_end_to_end_reload_on_external_change() {
    let dir = TempDir::new().unwrap();
    let file_a = dir.path().join("a.txt");
    fs::write(&file_a, "original").unwrap();

    let host = MockHost::new();
    host.open(&file_a, false);
    let config = Arc::new(MemoryConfigStore::default());
    let runtime = Runtime::new(host.clone(), config, dir.path().to_path_buf());

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let driver = tokio::spawn(runtime.run(events_rx));
    settle().await;

    // External modification.
    fs::write(&file_a, "changed externally").unwrap();

    let reloaded = timeout(Duration::from_secs(10), async {
        loop {
            if host.revert_count() >= 1 {
                break;
            }
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(reloaded.is_ok(), "expected a reload within the timeout");
    assert_eq!(host.reverted_paths()[0], file_a.clone());

    // Nothing further changes on disk: the mtime refresh after the reload
    // must not spark a second reload.
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(host.revert_count(), 1);

    drop(events_tx);
    let _ = timeout(Duration::from_secs(5), driver).await;
}

#[tokio::test]
async fn test_dirty_buffer_survives_external_change_end_to_end() {
    let dir = TempDir::new().unwrap();
    let file_a = dir.path().join("a.txt");
    fs::write(&file_a, "original").unwrap();

    let host = MockHost::new();
    host.open(&file_a, true);
    let config = Arc::new(MemoryConfigStore::default());
    let runtime = Runtime::new(host.clone(), config, dir.path().to_path_buf());

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let driver = tokio::spawn(runtime.run(events_rx));
    settle().await;

    fs::write(&file_a, "changed externally").unwrap();

    // The conflict surfaces as a prompt, never as a content change.
    let prompted = timeout(Duration::from_secs(10), async {
        loop {
            if host.prompt_count() >= 1 {
                break;
            }
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(prompted.is_ok(), "expected a prompt within the timeout");
    assert_eq!(host.revert_count(), 0);

    drop(events_tx);
    let _ = timeout(Duration::from_secs(5), driver).await;
}
