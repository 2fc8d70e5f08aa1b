// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Whole-document JSON persistence.
//!
//! A document is a flat JSON object: data entries keyed by string, plus the
//! reserved metadata keys `_last_updated`, `_reset_at` and `_last_cleanup`.
//! Reads are served from a cache populated on first use. Writes download the
//! current document, apply the change, upload the result and replace the
//! cache, all under one async lock so writers in this process never
//! interleave. Across processes the last writer wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_adapters::{Storage, StorageError};
use relay_core::{Clock, SystemClock};
use relay_resilience::RetryPolicy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::StateError;

pub const RESERVED_KEYS: [&str; 3] = ["_last_updated", "_reset_at", "_last_cleanup"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<V> {
    #[serde(rename = "_last_updated", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(rename = "_reset_at", default, skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
    #[serde(rename = "_last_cleanup", default, skip_serializing_if = "Option::is_none")]
    pub last_cleanup: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub entries: BTreeMap<String, V>,
}

impl<V> Default for Document<V> {
    fn default() -> Self {
        Self { last_updated: None, reset_at: None, last_cleanup: None, entries: BTreeMap::new() }
    }
}

/// Result of an update closure: whether the document must be written back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change<R> {
    Write(R),
    Unchanged(R),
}

/// Reject data keys that would collide with document metadata.
pub(crate) fn check_key(key: &str) -> Result<(), StateError> {
    if RESERVED_KEYS.contains(&key) {
        return Err(StateError::ReservedKey(key.to_string()));
    }
    Ok(())
}

pub struct DocumentStore<V, C: Clock = SystemClock> {
    storage: Arc<dyn Storage>,
    path: String,
    retry: RetryPolicy,
    clock: C,
    cache: Mutex<Option<Document<V>>>,
}

impl<V, C> DocumentStore<V, C>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
    C: Clock,
{
    pub fn new(storage: Arc<dyn Storage>, path: impl Into<String>, clock: C) -> Self {
        Self {
            storage,
            path: path.into(),
            retry: RetryPolicy::default(),
            clock,
            cache: Mutex::new(None),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self.cache = Mutex::new(None);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Name of the storage backend
    pub fn backend(&self) -> &str {
        self.storage.name()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc_now()
    }

    /// Current document, from cache when loaded.
    pub async fn read(&self) -> Result<Document<V>, StateError> {
        let mut cache = self.cache.lock().await;
        if let Some(doc) = cache.as_ref() {
            return Ok(doc.clone());
        }
        let doc = self.fetch().await?;
        *cache = Some(doc.clone());
        Ok(doc)
    }

    /// Read-modify-write against a fresh download.
    ///
    /// `_last_updated` is stamped on every write. When `f` reports
    /// [`Change::Unchanged`] nothing is uploaded.
    pub async fn update<R, F>(&self, f: F) -> Result<R, StateError>
    where
        F: FnOnce(&mut Document<V>) -> Result<Change<R>, StateError>,
    {
        let mut cache = self.cache.lock().await;
        let mut doc = self.fetch().await?;
        let out = match f(&mut doc)? {
            Change::Unchanged(out) => {
                *cache = Some(doc);
                return Ok(out);
            }
            Change::Write(out) => out,
        };
        doc.last_updated = Some(self.clock.utc_now());
        self.store(&doc).await?;
        *cache = Some(doc);
        Ok(out)
    }

    /// Replace the document with an empty one stamped `_reset_at`.
    pub async fn reset(&self) -> Result<(), StateError> {
        let mut cache = self.cache.lock().await;
        let doc = Document { reset_at: Some(self.clock.utc_now()), ..Document::default() };
        self.store(&doc).await?;
        *cache = Some(doc);
        tracing::warn!(path = %self.path, "state document reset");
        Ok(())
    }

    async fn fetch(&self) -> Result<Document<V>, StateError> {
        let downloaded = self
            .retry
            .run(&self.path, || async {
                match self.storage.download(&self.path).await {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(StorageError::NotFound(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await?;

        let Some(bytes) = downloaded else {
            tracing::debug!(path = %self.path, "no state document yet");
            return Ok(Document::default());
        };
        let doc: Document<V> = serde_json::from_slice(&bytes)
            .map_err(|source| StateError::Corrupt { path: self.path.clone(), source })?;
        tracing::debug!(path = %self.path, entries = doc.entries.len(), "loaded state document");
        Ok(doc)
    }

    async fn store(&self, doc: &Document<V>) -> Result<(), StateError> {
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|source| StateError::Encode { path: self.path.clone(), source })?;
        self.retry.run(&self.path, || self.storage.upload(&self.path, bytes.clone())).await?;
        tracing::debug!(path = %self.path, entries = doc.entries.len(), "saved state document");
        Ok(())
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
