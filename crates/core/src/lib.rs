// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-core: domain types shared by every relay crate

pub mod macros;

pub mod change;
pub mod clock;
pub mod dedup;
pub mod job;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

#[cfg(any(test, feature = "test-support"))]
pub use change::ChangedEntryBuilder;
pub use change::{ChangedEntry, SourceRef};
pub use clock::{Clock, FakeClock, SystemClock};
pub use dedup::DedupKey;
pub use job::{JobId, JobSpec, JobState, JobStatus, ResourceRequirements};
