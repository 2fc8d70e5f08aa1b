// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry with configurable backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Classifies an error as worth another attempt.
///
/// Only transient failures (network blips, throttling, timeouts) should
/// return `true`; auth and not-found errors short-circuit the retry loop.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    #[default]
    Exponential,
}

relay_core::simple_display! {
    BackoffStrategy {
        Fixed => "fixed",
        Linear => "linear",
        Exponential => "exponential",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    relay_core::setters! {
        set {
            max_attempts: u32,
            base_delay: Duration,
            max_delay: Duration,
            strategy: BackoffStrategy,
            multiplier: f64,
            jitter: bool,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-based),
    /// capped at `max_delay`, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let secs = match self.strategy {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Linear => base * f64::from(attempt.saturating_add(1)),
            BackoffStrategy::Exponential => {
                let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
                base * self.multiplier.powi(exp)
            }
        };
        Duration::try_from_secs_f64(secs).map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Backoff plus up to 10% jitter when enabled.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        if !self.jitter {
            return delay;
        }
        delay + delay.mul_f64(0.1 * unit_random())
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            attempt += 1;
            if !err.is_retryable() {
                tracing::debug!(label, attempt, error = %err, "non-retryable failure");
                return Err(err);
            }
            if attempt >= max_attempts {
                tracing::error!(label, attempts = attempt, error = %err, "retry budget exhausted");
                return Err(err);
            }
            let delay = self.delay_for(attempt - 1);
            tracing::warn!(
                label,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Uniform sample in `[0, 1)` drawn from the low 53 bits of a v4 UUID (the
/// version and variant bits sit above them).
fn unit_random() -> f64 {
    const MANTISSA: u128 = (1 << 53) - 1;
    let bits = uuid::Uuid::new_v4().as_u128() & MANTISSA;
    bits as f64 / (1u64 << 53) as f64
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
