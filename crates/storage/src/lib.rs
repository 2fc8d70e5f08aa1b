// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-storage: durable pipeline state.
//!
//! Two flat JSON documents kept in object storage: the change-feed cursors
//! and the processed-job ledger. Both are rewritten whole on every change.

mod cursor;
mod document;
mod error;
mod tracker;

pub use cursor::{CursorEntry, CursorInfo, CursorManager, DEFAULT_CURSOR_PATH};
pub use document::{Change, Document, DocumentStore, RESERVED_KEYS};
pub use error::StateError;
pub use tracker::{JobRecord, JobTracker, TrackingInfo, DEFAULT_TRACKING_PATH};
