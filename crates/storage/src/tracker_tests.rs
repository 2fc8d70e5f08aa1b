// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_adapters::MemoryStorage;
use relay_core::test_support::entry;
use relay_core::{DedupKey, FakeClock};
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 3600);

fn tracker(storage: &MemoryStorage, clock: &FakeClock) -> JobTracker<FakeClock> {
    JobTracker::with_clock(Arc::new(storage.clone()), clock.clone())
        .with_retry(RetryPolicy::no_retry())
}

#[tokio::test]
async fn mark_then_is_processed() {
    let storage = MemoryStorage::new();
    let clock = FakeClock::new();
    let ledger = tracker(&storage, &clock);
    let file = entry("/transcripts/raw", "a.mp3");
    let key = DedupKey::for_path(&file.path);

    assert!(!ledger.is_processed(key.as_str()).await.unwrap());
    let record =
        ledger.mark_processed(key.as_str(), Some(&JobId::from("job-1")), Some(&file)).await.unwrap();

    assert!(ledger.is_processed(key.as_str()).await.unwrap());
    assert_eq!(record.processed_at, clock.utc_now());
    assert!(record.success);
    assert_eq!(ledger.get_record(key.as_str()).await.unwrap(), Some(record));

    let json = storage.get_json(DEFAULT_TRACKING_PATH).unwrap();
    assert_eq!(json[key.as_str()]["job_id"], "job-1");
    assert_eq!(json[key.as_str()]["file_info"]["name"], "a.mp3");
}

#[tokio::test]
async fn ledger_is_shared_across_instances() {
    let storage = MemoryStorage::new();
    let clock = FakeClock::new();
    tracker(&storage, &clock).mark_processed("k1", None, None).await.unwrap();

    assert!(tracker(&storage, &clock).is_processed("k1").await.unwrap());
}

#[tokio::test]
async fn list_is_most_recent_first_with_limit() {
    let storage = MemoryStorage::new();
    let clock = FakeClock::new();
    let ledger = tracker(&storage, &clock);
    for key in ["first", "second", "third"] {
        ledger.mark_processed(key, None, None).await.unwrap();
        clock.advance(Duration::from_secs(60));
    }

    let all = ledger.list_processed(None).await.unwrap();
    let keys: Vec<_> = all.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["third", "second", "first"]);

    let limited = ledger.list_processed(Some(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].0, "third");
    assert_eq!(ledger.processed_count().await.unwrap(), 3);
}

#[tokio::test]
async fn remove_record_allows_reprocessing() {
    let storage = MemoryStorage::new();
    let ledger = tracker(&storage, &FakeClock::new());
    ledger.mark_processed("k1", None, None).await.unwrap();

    assert!(ledger.remove_record("k1").await.unwrap());
    assert!(!ledger.remove_record("k1").await.unwrap());
    assert!(!ledger.is_processed("k1").await.unwrap());
}

#[tokio::test]
async fn cleanup_removes_only_old_records() {
    let storage = MemoryStorage::new();
    let clock = FakeClock::new();
    let ledger = tracker(&storage, &clock);
    ledger.mark_processed("old", None, None).await.unwrap();
    clock.advance(DAY * 20);
    ledger.mark_processed("recent", None, None).await.unwrap();
    clock.advance(DAY * 15);

    let removed = ledger.cleanup_older_than(30).await.unwrap();
    assert_eq!(removed, 1);
    assert!(!ledger.is_processed("old").await.unwrap());
    assert!(ledger.is_processed("recent").await.unwrap());

    let info = ledger.info().await.unwrap();
    assert_eq!(info.last_cleanup, Some(clock.utc_now()));
    assert_eq!(info.processed_count, 1);
}

#[tokio::test]
async fn cleanup_with_nothing_to_remove_does_not_write() {
    let storage = MemoryStorage::new();
    let ledger = tracker(&storage, &FakeClock::new());
    ledger.mark_processed("k1", None, None).await.unwrap();
    let uploads = storage.upload_count();

    assert_eq!(ledger.cleanup_older_than(30).await.unwrap(), 0);
    assert_eq!(storage.upload_count(), uploads);
    assert_eq!(ledger.info().await.unwrap().last_cleanup, None);
}

#[tokio::test]
async fn reset_clears_everything() {
    let storage = MemoryStorage::new();
    let ledger = tracker(&storage, &FakeClock::new());
    ledger.mark_processed("k1", None, None).await.unwrap();
    ledger.mark_processed("k2", None, None).await.unwrap();

    ledger.reset_all().await.unwrap();

    assert_eq!(ledger.processed_count().await.unwrap(), 0);
    assert!(ledger.info().await.unwrap().reset_at.is_some());
}

#[tokio::test]
async fn reserved_key_is_rejected() {
    let storage = MemoryStorage::new();
    let ledger = tracker(&storage, &FakeClock::new());

    let err = ledger.mark_processed("_last_cleanup", None, None).await.unwrap_err();
    assert!(matches!(err, StateError::ReservedKey(_)));
}

#[tokio::test]
async fn older_records_without_success_flag_default_to_success() {
    let storage = MemoryStorage::new();
    storage.put(
        DEFAULT_TRACKING_PATH,
        r#"{"k1": {"job_id": "j-1", "processed_at": "2026-01-01T00:00:00Z"}}"#,
    );
    let ledger = tracker(&storage, &FakeClock::new());

    let record = ledger.get_record("k1").await.unwrap().unwrap();
    assert!(record.success);
    assert_eq!(record.job_id, Some(JobId::from("j-1")));
    assert_eq!(record.file_info, None);
}

#[tokio::test]
async fn corrupt_ledger_is_an_error_not_empty() {
    let storage = MemoryStorage::new();
    storage.put(DEFAULT_TRACKING_PATH, "[]");
    let ledger = tracker(&storage, &FakeClock::new());

    assert!(matches!(ledger.is_processed("k1").await, Err(StateError::Corrupt { .. })));
}
