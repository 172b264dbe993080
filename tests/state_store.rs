//! StateStore Integration Tests
//!
//! Tests for durability of the processing state across reopen and for two
//! handles sharing one state file, as the watcher and the CLI do.

use std::sync::Arc;

use chrono::{Duration, Utc};
use minutes::core::{Handled, MarkResult, StateStore};
use minutes::domain::PipelineSettings;
use tempfile::TempDir;

#[tokio::test]
async fn test_state_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");
    let cursor = Utc::now();

    {
        let store = StateStore::open(&path).await.unwrap();
        store.mark_processed("m1").await.unwrap();
        store.mark_ignored("m2").await.unwrap();
        store.set_cursor(cursor).await.unwrap();
        store
            .update_settings(|s: &mut PipelineSettings| {
                s.set("notify_recipient", "dana@example.com")
            })
            .await
            .unwrap()
            .unwrap();
    }

    let store = StateStore::open(&path).await.unwrap();
    assert_eq!(store.handled("m1").await, Some(Handled::Processed));
    assert_eq!(store.handled("m2").await, Some(Handled::Ignored));
    assert_eq!(store.handled("m3").await, None);
    assert_eq!(store.cursor().await, Some(cursor));
    assert_eq!(
        store.settings().await.notify_recipient.as_deref(),
        Some("dana@example.com")
    );
}

#[tokio::test]
async fn test_reset_reports_counts_and_keeps_cursor() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::open(temp.path().join("state.json")).await.unwrap();
    let cursor = Utc::now();

    for id in ["a", "b", "c"] {
        store.mark_processed(id).await.unwrap();
    }
    store.mark_ignored("d").await.unwrap();
    store.set_cursor(cursor).await.unwrap();

    let cleared = store.reset().await.unwrap();
    assert_eq!(cleared.processed, 3);
    assert_eq!(cleared.ignored, 1);

    let summary = store.summary().await;
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.ignored, 0);
    assert_eq!(summary.cursor, Some(cursor));
    assert!(!store.is_handled("a").await);
}

#[tokio::test]
async fn test_cursor_never_regresses() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::open(temp.path().join("state.json")).await.unwrap();
    let now = Utc::now();

    assert!(store.set_cursor(now).await.unwrap());
    assert!(!store.set_cursor(now - Duration::minutes(5)).await.unwrap());
    assert!(!store.set_cursor(now).await.unwrap());
    assert_eq!(store.cursor().await, Some(now));
}

#[tokio::test]
async fn test_cross_set_marking_rejected() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::open(temp.path().join("state.json")).await.unwrap();

    assert_eq!(store.mark_ignored("m1").await.unwrap(), MarkResult::Marked);
    assert_eq!(store.mark_ignored("m1").await.unwrap(), MarkResult::AlreadyMarked);
    assert_eq!(
        store.mark_processed("m1").await.unwrap(),
        MarkResult::Rejected(Handled::Ignored)
    );
    assert_eq!(store.handled("m1").await, Some(Handled::Ignored));
}

#[tokio::test]
async fn test_two_handles_share_one_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");
    let watcher = StateStore::open(&path).await.unwrap();
    let cli = StateStore::open(&path).await.unwrap();

    watcher.mark_processed("m1").await.unwrap();
    cli.mark_processed("m2").await.unwrap();

    // Each mutation re-reads the file, so neither write is lost
    watcher.refresh().await.unwrap();
    assert!(watcher.is_handled("m1").await);
    assert!(watcher.is_handled("m2").await);

    // A reset from the CLI is visible to the watcher after refresh
    cli.reset().await.unwrap();
    watcher.refresh().await.unwrap();
    assert!(!watcher.is_handled("m1").await);
}

#[tokio::test]
async fn test_concurrent_marks_all_recorded() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(StateStore::open(temp.path().join("state.json")).await.unwrap());

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.mark_processed(&format!("m{}", i)).await.unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), MarkResult::Marked);
    }

    let reopened = StateStore::open(store.path()).await.unwrap();
    assert_eq!(reopened.summary().await.processed, 20);
}

#[tokio::test]
async fn test_invalid_setting_leaves_document_untouched() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");
    let store = StateStore::open(&path).await.unwrap();

    let result = store
        .update_settings(|s: &mut PipelineSettings| s.set("window", "0"))
        .await
        .unwrap();
    assert!(result.is_err());
    assert!(!path.exists());
    assert_eq!(store.settings().await.window, 50);
}
