// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-resilience: retry, circuit breaker, and timeout wrappers for calls
//! that cross a process boundary.

mod breaker;
mod retry;
mod timeout;

pub use breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitOpen, CircuitState};
pub use retry::{BackoffStrategy, RetryPolicy, Retryable};
pub use timeout::{with_timeout, with_timeout_blocking, Elapsed};
