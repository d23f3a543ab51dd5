// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Expect-style integration test harness for interactive CLI binaries.
//!
//! clidrive spawns the binary under test as a child process, drives it by
//! sending lines of input, and asserts that its output matches expected
//! patterns within bounded time. On Unix the child runs under a
//! pseudo-terminal so interactive prompts behave as in a real terminal; on
//! Windows it runs over anonymous pipes. Every failure carries the complete
//! output accumulated so far, and no failure path can leave the child
//! running.
//!
//! # Example
//!
//! ```no_run
//! use clidrive::{Harness, HarnessError};
//!
//! # async fn example() -> Result<(), HarnessError> {
//! let harness = Harness::new("build/cli", "integration.log")?;
//! let mut session = harness.session()?;
//!
//! session.spawn(&["auth"]).await?;
//! session.expect_exact("username:").await?;
//! session.send_line("test-user").await?;
//! session.expect_exact("password:").await?;
//! session.send_line("test-password").await?;
//! session.expect("logged in").await?;
//! session.wait().await?;
//! session.teardown().await?;
//! # Ok(())
//! # }
//! ```

pub mod bounded;
pub mod child;
pub mod env;
pub mod error;
pub mod expect;
pub mod metadata;
pub mod session;
pub mod sink;

mod pipe;
#[cfg(unix)]
mod pty;

pub use child::{ChildProcess, ReadOutcome, SpawnSpec, StdioBackend};
pub use env::{FeatureToggles, TestEnvironment};
pub use error::HarnessError;
pub use expect::{Expector, Matcher};
pub use metadata::BuildMetadata;
pub use session::{Harness, Lifecycle, TestSession};
pub use sink::OutputSink;
