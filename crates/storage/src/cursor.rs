// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change-feed cursors, one per monitored source key.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_adapters::Storage;
use relay_core::{Clock, SystemClock};
use relay_resilience::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::document::{check_key, Change, DocumentStore};
use crate::StateError;

pub const DEFAULT_CURSOR_PATH: &str = "webhook_cursors.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorEntry {
    pub token: String,
    pub updated_at: DateTime<Utc>,
}

/// Summary of the cursor document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CursorInfo {
    pub cursor_count: usize,
    pub keys: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub reset_at: Option<DateTime<Utc>>,
    pub backend: String,
    pub path: String,
}

pub struct CursorManager<C: Clock = SystemClock> {
    store: DocumentStore<CursorEntry, C>,
}

impl CursorManager<SystemClock> {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_clock(storage, SystemClock)
    }
}

impl<C: Clock> CursorManager<C> {
    pub fn with_clock(storage: Arc<dyn Storage>, clock: C) -> Self {
        tracing::info!(backend = %storage.name(), "cursor manager ready");
        Self { store: DocumentStore::new(storage, DEFAULT_CURSOR_PATH, clock) }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.store = self.store.with_path(path);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.store = self.store.with_retry(retry);
        self
    }

    pub async fn get_cursor(&self, key: &str) -> Result<Option<String>, StateError> {
        Ok(self.get_entry(key).await?.map(|entry| entry.token))
    }

    pub async fn get_entry(&self, key: &str) -> Result<Option<CursorEntry>, StateError> {
        let doc = self.store.read().await?;
        Ok(doc.entries.get(key).cloned())
    }

    /// Store `token` as the cursor for `key`, replacing any previous one.
    pub async fn set_cursor(&self, key: &str, token: &str) -> Result<(), StateError> {
        check_key(key)?;
        let entry = CursorEntry { token: token.to_string(), updated_at: self.store.now() };
        self.store
            .update(|doc| {
                doc.entries.insert(key.to_string(), entry);
                Ok(Change::Write(()))
            })
            .await?;
        tracing::debug!(key, "cursor stored");
        Ok(())
    }

    /// Store several cursors in one write. Nothing is written if any key is
    /// reserved.
    pub async fn update_cursors(
        &self,
        updates: impl IntoIterator<Item = (String, String)>,
    ) -> Result<usize, StateError> {
        let updates: Vec<(String, String)> = updates.into_iter().collect();
        for (key, _) in &updates {
            check_key(key)?;
        }
        if updates.is_empty() {
            return Ok(0);
        }
        let now = self.store.now();
        let count = updates.len();
        self.store
            .update(|doc| {
                for (key, token) in updates {
                    doc.entries.insert(key, CursorEntry { token, updated_at: now });
                }
                Ok(Change::Write(()))
            })
            .await?;
        tracing::info!(count, "cursors updated");
        Ok(count)
    }

    pub async fn list_cursors(&self) -> Result<BTreeMap<String, CursorEntry>, StateError> {
        Ok(self.store.read().await?.entries)
    }

    /// Remove the cursor for `key`. Returns false when there was none.
    pub async fn delete_cursor(&self, key: &str) -> Result<bool, StateError> {
        let removed = self
            .store
            .update(|doc| {
                Ok(match doc.entries.remove(key) {
                    Some(_) => Change::Write(true),
                    None => Change::Unchanged(false),
                })
            })
            .await?;
        if removed {
            tracing::info!(key, "cursor deleted");
        }
        Ok(removed)
    }

    /// Drop every cursor; the next notification for each key re-baselines.
    pub async fn reset_all(&self) -> Result<(), StateError> {
        self.store.reset().await
    }

    pub async fn info(&self) -> Result<CursorInfo, StateError> {
        let doc = self.store.read().await?;
        Ok(CursorInfo {
            cursor_count: doc.entries.len(),
            keys: doc.entries.keys().cloned().collect(),
            last_updated: doc.last_updated,
            reset_at: doc.reset_at,
            backend: self.store.backend().to_string(),
            path: self.store.path().to_string(),
        })
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
