// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type that carries a process exit code.
//!
//! Commands return `ExitError` for outcomes that are not failures of relay
//! itself (a job that failed, a wait that ran out of time) so `main()` can
//! exit with a distinct code. Any other error exits with 1.

use std::fmt;

/// The awaited job ended Failed or Cancelled
pub const JOB_UNSUCCESSFUL: i32 = 2;
/// A destructive command ran without `--yes`
pub const NOT_CONFIRMED: i32 = 3;
/// `job wait` gave up before the job finished
pub const WAIT_TIMEOUT: i32 = 4;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Refuse a destructive action that was not confirmed.
    pub fn not_confirmed(action: &str) -> Self {
        Self::new(NOT_CONFIRMED, format!("refusing to {} without --yes", action))
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

/// Exit code for a top-level error
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ExitError>().map_or(1, |e| e.code)
}
