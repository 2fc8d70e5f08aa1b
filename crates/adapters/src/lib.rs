// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-adapters: boundaries to the outside world.
//!
//! Object storage, change feeds, and job execution backends, each behind a
//! trait with an in-memory fake under the `test-support` feature.

pub mod runner;
pub mod source;
pub mod storage;

pub use runner::batch::{BatchApi, BatchRunner, KubeBatchApi, KubeRunnerConfig};
pub use runner::local::{LocalRunner, LocalRunnerConfig};
pub use runner::registry::{RunnerConfig, RunnerRegistry};
pub use runner::{Capabilities, JobCleanup, JobLogs, JobRunner, RunnerError};
pub use source::{ChangeBatch, ChangeSource, ChangeSourceError, FsChangeSource};
pub use storage::{FsStorage, Storage, StorageError};

#[cfg(any(test, feature = "test-support"))]
pub use runner::{FakeRunner, RunnerCall};
#[cfg(any(test, feature = "test-support"))]
pub use source::{FakeChangeSource, SourceCall};
#[cfg(any(test, feature = "test-support"))]
pub use storage::MemoryStorage;
