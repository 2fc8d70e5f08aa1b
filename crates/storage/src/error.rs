// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use relay_adapters::StorageError;
use relay_resilience::Retryable;
use thiserror::Error;

/// Errors from cursor and ledger operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("corrupt state document {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode state document {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{0}' is reserved for document metadata")]
    ReservedKey(String),
}

impl Retryable for StateError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_retryable(),
            Self::Corrupt { .. } | Self::Encode { .. } | Self::ReservedKey(_) => false,
        }
    }
}
