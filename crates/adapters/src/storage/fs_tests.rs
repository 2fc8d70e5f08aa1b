// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_resilience::Retryable;
use tempfile::tempdir;

#[tokio::test]
async fn upload_then_download() {
    let dir = tempdir().unwrap();
    let storage = FsStorage::new(dir.path());

    storage.upload("state/cursors.json", b"{}".to_vec()).await.unwrap();

    assert_eq!(storage.download("state/cursors.json").await.unwrap(), b"{}");
    assert!(dir.path().join("state/cursors.json").exists());
    assert!(storage.exists("/state/cursors.json").await.unwrap());
}

#[tokio::test]
async fn download_missing_is_not_found() {
    let dir = tempdir().unwrap();
    let storage = FsStorage::new(dir.path());

    let err = storage.download("missing.json").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(ref p) if p == "missing.json"));
    assert!(!err.is_retryable());
    assert!(!storage.exists("missing.json").await.unwrap());
}

#[tokio::test]
async fn upload_replaces_and_leaves_no_temp_files() {
    let dir = tempdir().unwrap();
    let storage = FsStorage::new(dir.path());

    storage.upload("doc.json", b"one".to_vec()).await.unwrap();
    storage.upload("doc.json", b"two".to_vec()).await.unwrap();

    assert_eq!(storage.download("doc.json").await.unwrap(), b"two");
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["doc.json".to_string()]);
}

#[yare::parameterized(
    parent_dir = { "../escape.json" },
    nested_parent = { "a/../../escape.json" },
    empty = { "" },
    only_slash = { "/" },
)]
fn rejects_paths_outside_root(path: &str) {
    let storage = FsStorage::new("/tmp/relay-root");
    assert!(matches!(storage.resolve(path), Err(StorageError::InvalidPath(_))));
}

#[test]
fn leading_slash_is_relative_to_root() {
    let storage = FsStorage::new("/tmp/relay-root");
    assert_eq!(
        storage.resolve("/webhook_cursors.json").unwrap(),
        std::path::PathBuf::from("/tmp/relay-root/webhook_cursors.json")
    );
}
