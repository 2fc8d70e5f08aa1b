// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker guarding calls to a failing dependency.
//!
//! Closed → Open once `failure_threshold` failures accumulate. Open rejects
//! calls until `recovery_timeout` has passed since the last failure, then the
//! next call is let through in HalfOpen. In HalfOpen a single failure reopens
//! the circuit and `half_open_successes` consecutive successes close it.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use relay_core::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

relay_core::simple_display! {
    CircuitState {
        Closed => "closed",
        Open => "open",
        HalfOpen => "half_open",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub half_open_successes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_successes: 3,
        }
    }
}

impl BreakerConfig {
    relay_core::setters! {
        set {
            failure_threshold: u32,
            recovery_timeout: Duration,
            half_open_successes: u32,
        }
    }
}

/// Point-in-time copy of the breaker's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_at: Option<Instant>,
    pub half_open_successes: u32,
}

#[derive(Debug, Clone, Error)]
#[error("circuit breaker '{name}' is open")]
pub struct CircuitOpen {
    pub name: String,
}

pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    config: BreakerConfig,
    clock: C,
    inner: Mutex<BreakerSnapshot>,
}

impl CircuitBreaker<SystemClock> {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_clock(name, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn with_clock(name: impl Into<String>, config: BreakerConfig, clock: C) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(BreakerSnapshot {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
                half_open_successes: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        *self.inner.lock()
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Check whether a call may proceed, moving Open → HalfOpen once the
    /// recovery timeout has elapsed.
    pub fn try_acquire(&self) -> Result<(), CircuitOpen> {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }
        let recovered = match inner.last_failure_at {
            Some(at) => {
                self.clock.now().saturating_duration_since(at) >= self.config.recovery_timeout
            }
            None => true,
        };
        if !recovered {
            return Err(CircuitOpen { name: self.name.clone() });
        }
        inner.state = CircuitState::HalfOpen;
        inner.half_open_successes = 0;
        tracing::info!(breaker = %self.name, "circuit half-open, probing");
        Ok(())
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_successes {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.half_open_successes = 0;
                    tracing::info!(breaker = %self.name, "circuit closed");
                }
            }
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(self.clock.now());
        let trip = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.failure_count >= self.config.failure_threshold,
            CircuitState::Open => false,
        };
        if trip {
            inner.state = CircuitState::Open;
            inner.half_open_successes = 0;
            tracing::warn!(
                breaker = %self.name,
                failures = inner.failure_count,
                "circuit opened"
            );
        }
    }

    /// Run `op` through the breaker. Rejected calls never invoke `op`.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpen>,
    {
        self.try_acquire()?;
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
