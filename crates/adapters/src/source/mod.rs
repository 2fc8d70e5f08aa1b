// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change-feed adapters.
//!
//! A change source hands out opaque cursors: `list_initial` returns the
//! current contents plus a baseline cursor, `list_since` returns what changed
//! after a cursor plus the cursor to use next time.

mod fs;

pub use fs::FsChangeSource;

use async_trait::async_trait;
use relay_core::ChangedEntry;
use relay_resilience::Retryable;
use thiserror::Error;

/// One page of a change feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub cursor: String,
    pub entries: Vec<ChangedEntry>,
}

/// Errors from change-source operations
#[derive(Debug, Error)]
pub enum ChangeSourceError {
    /// The cursor is no longer accepted; the caller must re-baseline
    #[error("change cursor expired")]
    CursorExpired,

    #[error("change source authentication failed: {0}")]
    Auth(String),

    #[error("source folder not found: {0}")]
    NotFound(String),

    #[error("change source unavailable: {0}")]
    Unavailable(String),
}

impl Retryable for ChangeSourceError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Adapter for a cursor-based change feed
#[async_trait]
pub trait ChangeSource: Send + Sync + 'static {
    /// Full listing of `source_key` plus a baseline cursor
    async fn list_initial(&self, source_key: &str) -> Result<ChangeBatch, ChangeSourceError>;

    /// Entries changed after `cursor` plus the next cursor
    async fn list_since(&self, cursor: &str) -> Result<ChangeBatch, ChangeSourceError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ChangeBatch, ChangeSource, ChangeSourceError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use relay_core::ChangedEntry;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Recorded change-source call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SourceCall {
        ListInitial { source_key: String },
        ListSince { cursor: String },
    }

    #[derive(Default)]
    struct FakeSourceState {
        calls: Vec<SourceCall>,
        /// Current full listing returned by `list_initial`
        listing: Vec<ChangedEntry>,
        /// Scripted responses consumed by `list_since`; empty ⇒ no changes
        responses: VecDeque<Result<Vec<ChangedEntry>, ChangeSourceError>>,
        fail_initial: Option<String>,
        sequence: u64,
    }

    /// Scripted change source for testing.
    ///
    /// Cursors are `c<N>` with N increasing on every successful call.
    #[derive(Clone, Default)]
    pub struct FakeChangeSource {
        inner: Arc<Mutex<FakeSourceState>>,
    }

    impl FakeChangeSource {
        pub fn new() -> Self {
            Self::default()
        }

        /// Replace the full listing returned by `list_initial`
        pub fn set_listing(&self, entries: Vec<ChangedEntry>) {
            self.inner.lock().listing = entries;
        }

        /// Queue the entries the next `list_since` returns
        pub fn push_changes(&self, entries: Vec<ChangedEntry>) {
            self.inner.lock().responses.push_back(Ok(entries));
        }

        /// Queue an error for the next `list_since`
        pub fn push_error(&self, error: ChangeSourceError) {
            self.inner.lock().responses.push_back(Err(error));
        }

        /// Make every `list_initial` fail until cleared
        pub fn fail_initial(&self, message: Option<&str>) {
            self.inner.lock().fail_initial = message.map(str::to_string);
        }

        /// Get all recorded calls
        pub fn calls(&self) -> Vec<SourceCall> {
            self.inner.lock().calls.clone()
        }

        /// The cursor most recently handed out
        pub fn last_cursor(&self) -> Option<String> {
            let seq = self.inner.lock().sequence;
            (seq > 0).then(|| format!("c{}", seq))
        }
    }

    fn next_cursor(state: &mut FakeSourceState) -> String {
        state.sequence += 1;
        format!("c{}", state.sequence)
    }

    #[async_trait]
    impl ChangeSource for FakeChangeSource {
        async fn list_initial(&self, source_key: &str) -> Result<ChangeBatch, ChangeSourceError> {
            let mut state = self.inner.lock();
            state.calls.push(SourceCall::ListInitial { source_key: source_key.to_string() });
            if let Some(message) = state.fail_initial.clone() {
                return Err(ChangeSourceError::Unavailable(message));
            }
            let entries = state.listing.clone();
            Ok(ChangeBatch { cursor: next_cursor(&mut state), entries })
        }

        async fn list_since(&self, cursor: &str) -> Result<ChangeBatch, ChangeSourceError> {
            let mut state = self.inner.lock();
            state.calls.push(SourceCall::ListSince { cursor: cursor.to_string() });
            let entries = state.responses.pop_front().unwrap_or(Ok(Vec::new()))?;
            Ok(ChangeBatch { cursor: next_cursor(&mut state), entries })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeChangeSource, SourceCall};
