// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test orchestration: suite-level harness and per-test sessions.
//!
//! [`Harness`] is created once per suite with the binary under test and the
//! log destination. [`TestSession`] is created per test and walks the
//! lifecycle `Idle -> Spawned -> (Interacting)* -> Waited | Terminated`;
//! teardown guarantees no child process survives the test.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::child::{ChildProcess, SpawnSpec};
use crate::env::{FeatureToggles, TestEnvironment};
use crate::error::HarnessError;
use crate::expect::{Expector, Matcher};

pub const DEFAULT_EXPECT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a session is in its life. Teardown requires `Waited`,
/// `Terminated`, or a session that never spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Spawned,
    Interacting,
    Waited,
    Terminated,
}

/// Suite-scoped harness: the binary under test plus the shared log file.
///
/// Creating the harness removes a stale log from a previous run; this is
/// the only initialization the log needs and it is scoped to the instance,
/// not the process.
pub struct Harness {
    binary: PathBuf,
    log_path: PathBuf,
}

impl Harness {
    pub fn new(
        binary: impl Into<PathBuf>,
        log_path: impl Into<PathBuf>,
    ) -> Result<Self, HarnessError> {
        let log_path = log_path.into();
        match std::fs::remove_file(&log_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Self {
            binary: binary.into(),
            log_path,
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// A fresh session with default isolation.
    pub fn session(&self) -> Result<TestSession, HarnessError> {
        Ok(self.session_in(TestEnvironment::isolate()?))
    }

    /// A fresh session with explicit feature toggles.
    pub fn session_with(&self, toggles: FeatureToggles) -> Result<TestSession, HarnessError> {
        Ok(self.session_in(TestEnvironment::isolate_with(toggles)?))
    }

    /// A fresh session around an environment the test prepared itself.
    pub fn session_in(&self, env: TestEnvironment) -> TestSession {
        TestSession {
            binary: self.binary.clone(),
            log_path: self.log_path.clone(),
            env,
            child: None,
            expector: Expector::new(),
            lifecycle: Lifecycle::Idle,
            expect_timeout: DEFAULT_EXPECT_TIMEOUT,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

/// One test's worth of spawn/send/expect/wait against the binary under test.
pub struct TestSession {
    binary: PathBuf,
    log_path: PathBuf,
    env: TestEnvironment,
    child: Option<ChildProcess>,
    expector: Expector,
    lifecycle: Lifecycle,
    expect_timeout: Duration,
    wait_timeout: Duration,
}

impl TestSession {
    pub fn with_expect_timeout(mut self, limit: Duration) -> Self {
        self.expect_timeout = limit;
        self
    }

    pub fn with_wait_timeout(mut self, limit: Duration) -> Self {
        self.wait_timeout = limit;
        self
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn env(&self) -> &TestEnvironment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut TestEnvironment {
        &mut self.env
    }

    pub fn config_dir(&self) -> &Path {
        self.env.config_dir()
    }

    pub fn work_dir(&self) -> &Path {
        self.env.work_dir()
    }

    /// The decoded output of the current child, empty before any spawn.
    pub fn logged(&self) -> String {
        self.child
            .as_ref()
            .map(ChildProcess::logged)
            .unwrap_or_default()
    }

    /// Spawn the suite binary with `args`.
    pub async fn spawn(&mut self, args: &[&str]) -> Result<(), HarnessError> {
        let spec = SpawnSpec::new(&self.binary).with_args(args.iter().copied());
        self.spawn_spec(spec).await
    }

    /// Spawn an arbitrary executable under this test's environment.
    pub async fn spawn_program(
        &mut self,
        program: impl Into<PathBuf>,
        args: &[&str],
    ) -> Result<(), HarnessError> {
        let spec = SpawnSpec::new(program).with_args(args.iter().copied());
        self.spawn_spec(spec).await
    }

    /// Spawn from a fully specified [`SpawnSpec`]. The session's overlay is
    /// applied underneath any variables the spec sets itself, and the
    /// session work directory is used unless the spec names its own.
    pub async fn spawn_spec(&mut self, mut spec: SpawnSpec) -> Result<(), HarnessError> {
        // One live child per test. A still-running child here means the
        // test lost track of it.
        if let Some(child) = self.child.as_mut() {
            if child.is_running() {
                let pid = child.pid();
                child.terminate().await?;
                self.lifecycle = Lifecycle::Terminated;
                return Err(HarnessError::LeakedProcess { pid });
            }
        }

        let specific = std::mem::take(&mut spec.env);
        for (name, value) in self.env.overlay() {
            spec.set_env_var(name.clone(), value.clone());
        }
        for (name, value) in specific {
            spec.set_env_var(name, value);
        }
        if spec.working_dir.is_none() {
            spec.working_dir = Some(self.env.work_dir().to_path_buf());
        }

        self.child = Some(ChildProcess::spawn(&spec, &self.log_path)?);
        self.expector = Expector::new();
        self.lifecycle = Lifecycle::Spawned;
        Ok(())
    }

    /// Expect a regular-expression pattern with the session default bound.
    pub async fn expect(&mut self, pattern: &str) -> Result<(), HarnessError> {
        self.expect_within(pattern, self.expect_timeout).await
    }

    pub async fn expect_within(
        &mut self,
        pattern: &str,
        limit: Duration,
    ) -> Result<(), HarnessError> {
        let matcher = Matcher::regex(pattern)?;
        self.run_expect(&matcher, limit).await
    }

    /// Expect a literal with the session default bound.
    pub async fn expect_exact(&mut self, literal: &str) -> Result<(), HarnessError> {
        self.expect_exact_within(literal, self.expect_timeout).await
    }

    pub async fn expect_exact_within(
        &mut self,
        literal: &str,
        limit: Duration,
    ) -> Result<(), HarnessError> {
        let matcher = Matcher::exact(literal)?;
        self.run_expect(&matcher, limit).await
    }

    async fn run_expect(&mut self, matcher: &Matcher, limit: Duration) -> Result<(), HarnessError> {
        let Some(child) = self.child.as_mut() else {
            return Err(no_child());
        };
        match self.expector.expect(child, matcher, limit).await {
            Ok(_) => {
                self.lifecycle = Lifecycle::Interacting;
                Ok(())
            }
            Err(e) => {
                // A failed expect has already terminated the child.
                if e.is_timeout() || e.is_eof() {
                    self.lifecycle = Lifecycle::Terminated;
                }
                Err(e)
            }
        }
    }

    /// Send a line of input to the child. Without a live child this is a
    /// logged no-op.
    pub async fn send_line(&mut self, text: &str) -> Result<(), HarnessError> {
        match self.child.as_mut() {
            Some(child) => {
                child.send_line(text).await?;
                if matches!(self.lifecycle, Lifecycle::Spawned | Lifecycle::Interacting) {
                    self.lifecycle = Lifecycle::Interacting;
                }
                Ok(())
            }
            None => {
                tracing::warn!(text, "send_line with no child spawned, dropping input");
                Ok(())
            }
        }
    }

    /// Wait for exit code 0 within the session default bound.
    pub async fn wait(&mut self) -> Result<i32, HarnessError> {
        self.wait_for(0, self.wait_timeout).await
    }

    /// Wait for a specific exit code within the session default bound.
    pub async fn wait_code(&mut self, code: i32) -> Result<i32, HarnessError> {
        self.wait_for(code, self.wait_timeout).await
    }

    /// Wait for the child to exit and assert its exit code.
    ///
    /// When the harness itself terminated the child (failed expect, earlier
    /// `terminate`), the reported code is platform-conditioned; assert only
    /// on codes from natural exits.
    pub async fn wait_for(&mut self, code: i32, limit: Duration) -> Result<i32, HarnessError> {
        let Some(child) = self.child.as_mut() else {
            return Err(no_child());
        };
        match child.wait(limit).await {
            Ok(actual) => {
                self.lifecycle = Lifecycle::Waited;
                if actual != code {
                    return Err(HarnessError::ExitCode {
                        expected: code,
                        actual,
                        output: child.logged(),
                    });
                }
                Ok(actual)
            }
            Err(e) => {
                if e.is_timeout() {
                    self.lifecycle = Lifecycle::Terminated;
                }
                Err(e)
            }
        }
    }

    /// Force the current child to stop. Idempotent; no-op without a child.
    pub async fn terminate(&mut self) -> Result<(), HarnessError> {
        if let Some(child) = self.child.as_mut() {
            child.terminate().await?;
            self.lifecycle = Lifecycle::Terminated;
        }
        Ok(())
    }

    /// Is the current child still running?
    pub fn is_running(&mut self) -> bool {
        self.child
            .as_mut()
            .map(ChildProcess::is_running)
            .unwrap_or(false)
    }

    /// End-of-test check: no child may survive the test.
    ///
    /// A session that finished via `wait` or `terminate` (or never spawned)
    /// passes. A still-running child is forcibly terminated and the test
    /// fails with [`HarnessError::LeakedProcess`] regardless of its own
    /// outcome.
    pub async fn teardown(&mut self) -> Result<(), HarnessError> {
        match self.lifecycle {
            Lifecycle::Idle | Lifecycle::Waited | Lifecycle::Terminated => Ok(()),
            Lifecycle::Spawned | Lifecycle::Interacting => {
                let Some(child) = self.child.as_mut() else {
                    self.lifecycle = Lifecycle::Terminated;
                    return Ok(());
                };
                if child.is_running() {
                    let pid = child.pid();
                    tracing::warn!(pid, "child process leaked past the test, terminating");
                    child.terminate().await?;
                    self.lifecycle = Lifecycle::Terminated;
                    Err(HarnessError::LeakedProcess { pid })
                } else {
                    // Exited on its own without being waited on; nothing
                    // is running, so the leak invariant holds.
                    self.lifecycle = Lifecycle::Terminated;
                    Ok(())
                }
            }
        }
    }
}

fn no_child() -> HarnessError {
    HarnessError::Io(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "no child process spawned",
    ))
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
