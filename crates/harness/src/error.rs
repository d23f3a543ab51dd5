// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Failure taxonomy for the harness.
//!
//! Every failure that happened after output was produced carries the full
//! decoded log text, so a failed test can be diagnosed without re-running.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// The target binary could not be launched.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Output ended before the expected pattern appeared.
    #[error("reached EOF while expecting {pattern:?}, output:\n---\n{output}\n---")]
    Eof { pattern: String, output: String },

    /// An expect or wait exceeded its time bound.
    #[error("reached timeout while {operation}, output:\n---\n{output}\n---")]
    Timeout { operation: String, output: String },

    /// The child exited with a different code than the test asserted.
    #[error("expected exit code {expected}, got {actual}, output:\n---\n{output}\n---")]
    ExitCode {
        expected: i32,
        actual: i32,
        output: String,
    },

    /// A child process was still running at teardown.
    #[error("child process {pid} still running at teardown, sent quit signal")]
    LeakedProcess { pid: u32 },

    /// An expect pattern failed to compile.
    #[error("invalid expect pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The build metadata artifact could not be parsed.
    #[error("invalid build metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// I/O failure on the child's streams or the log file.
    #[error("harness I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// True for failures that indicate the time bound was exceeded.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::Timeout { .. })
    }

    /// True for failures caused by the output stream ending early.
    pub fn is_eof(&self) -> bool {
        matches!(self, HarnessError::Eof { .. })
    }
}
