// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object storage adapters.
//!
//! Relay persists its cursor and ledger documents as whole objects, so the
//! contract is deliberately small: download, upload, exists.

mod fs;

pub use fs::FsStorage;

use async_trait::async_trait;
use relay_resilience::Retryable;
use thiserror::Error;

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("access denied for {0}")]
    Auth(String),

    #[error("invalid object path: {0}")]
    InvalidPath(String),

    #[error("storage unavailable: {0}")]
    Transient(String),

    #[error("storage I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::Auth(path.to_string()),
            _ => Self::Io { path: path.to_string(), source },
        }
    }
}

impl Retryable for StorageError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            Self::NotFound(_) | Self::Auth(_) | Self::InvalidPath(_) => false,
        }
    }
}

/// Adapter for a flat object store keyed by path
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Short backend name for diagnostics (e.g. "fs")
    fn name(&self) -> &str;

    /// Fetch the object at `path`; `NotFound` when absent
    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Replace the object at `path`
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod memory {
    use super::{Storage, StorageError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct MemoryState {
        objects: HashMap<String, Vec<u8>>,
        failing_downloads: u32,
        failing_uploads: u32,
        uploads: usize,
    }

    /// In-memory storage for testing, with transient failure injection
    #[derive(Clone, Default)]
    pub struct MemoryStorage {
        inner: Arc<Mutex<MemoryState>>,
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed an object
        pub fn put(&self, path: &str, bytes: impl Into<Vec<u8>>) {
            self.inner.lock().objects.insert(path.to_string(), bytes.into());
        }

        /// Read an object back
        pub fn get(&self, path: &str) -> Option<Vec<u8>> {
            self.inner.lock().objects.get(path).cloned()
        }

        /// Parse an object as JSON
        pub fn get_json(&self, path: &str) -> Option<serde_json::Value> {
            self.get(path).and_then(|bytes| serde_json::from_slice(&bytes).ok())
        }

        /// Make the next `n` downloads fail with a transient error
        pub fn fail_next_downloads(&self, n: u32) {
            self.inner.lock().failing_downloads = n;
        }

        /// Make the next `n` uploads fail with a transient error
        pub fn fail_next_uploads(&self, n: u32) {
            self.inner.lock().failing_uploads = n;
        }

        /// Number of successful uploads so far
        pub fn upload_count(&self) -> usize {
            self.inner.lock().uploads
        }
    }

    #[async_trait]
    impl Storage for MemoryStorage {
        fn name(&self) -> &str {
            "memory"
        }

        async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
            let mut inner = self.inner.lock();
            if inner.failing_downloads > 0 {
                inner.failing_downloads -= 1;
                return Err(StorageError::Transient(format!("injected download failure: {}", path)));
            }
            inner.objects.get(path).cloned().ok_or_else(|| StorageError::NotFound(path.to_string()))
        }

        async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
            let mut inner = self.inner.lock();
            if inner.failing_uploads > 0 {
                inner.failing_uploads -= 1;
                return Err(StorageError::Transient(format!("injected upload failure: {}", path)));
            }
            inner.objects.insert(path.to_string(), bytes);
            inner.uploads += 1;
            Ok(())
        }

        async fn exists(&self, path: &str) -> Result<bool, StorageError> {
            Ok(self.inner.lock().objects.contains_key(path))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStorage;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
