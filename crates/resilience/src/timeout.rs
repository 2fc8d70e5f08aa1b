// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deadlines for external calls.
//!
//! An expired future is dropped. A blocking closure cannot be interrupted, so
//! on expiry it is abandoned on the blocking pool and left to finish alone.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::Retryable;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{label} timed out after {}ms", .limit.as_millis())]
pub struct Elapsed {
    pub label: String,
    pub limit: Duration,
}

impl Retryable for Elapsed {
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Await `fut` for at most `limit`.
pub async fn with_timeout<F>(label: &str, limit: Duration, fut: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(output) => Ok(output),
        Err(_) => {
            tracing::warn!(label, limit_ms = limit.as_millis() as u64, "operation timed out");
            Err(Elapsed { label: label.to_string(), limit })
        }
    }
}

/// Run a blocking closure on the blocking pool for at most `limit`.
///
/// A panic inside `f` is resumed on the caller. A closure cancelled before it
/// ran (runtime shutdown) is reported as expired.
pub async fn with_timeout_blocking<T, F>(label: &str, limit: Duration, f: F) -> Result<T, Elapsed>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(f);
    let joined = with_timeout(label, limit, handle).await?;
    joined_or_elapsed(label, limit, joined)
}

fn joined_or_elapsed<T>(
    label: &str,
    limit: Duration,
    joined: Result<T, tokio::task::JoinError>,
) -> Result<T, Elapsed> {
    match joined {
        Ok(value) => Ok(value),
        Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
        Err(join_err) => {
            tracing::warn!(label, error = %join_err, "blocking operation cancelled");
            Err(Elapsed { label: label.to_string(), limit })
        }
    }
}

#[cfg(test)]
#[path = "timeout_tests.rs"]
mod tests;
