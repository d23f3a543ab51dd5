// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Unified child-process facade over the PTY and pipe backends.
//!
//! Everything above this module (expect loop, session orchestration) is
//! written against [`ChildProcess`] and never sees which backend is active.

use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(unix)]
use nix::sys::signal::Signal;

use crate::bounded::{bounded, Expired};
use crate::error::HarnessError;
use crate::pipe::PipeChild;
#[cfg(unix)]
use crate::pty::PtyChild;
use crate::sink::OutputSink;

/// How long a single read waits for data before reporting the stream idle.
pub(crate) const READ_PATIENCE: Duration = Duration::from_millis(100);

/// Grace period for each stage of forced termination.
const TERMINATE_GRACE: Duration = Duration::from_secs(1);

/// Read patience while waiting for exit; short, so exit is noticed quickly.
const WAIT_READ_PATIENCE: Duration = Duration::from_millis(50);

#[cfg(windows)]
const PIPE_LINE_END: &[u8] = b"\r\n";
#[cfg(not(windows))]
const PIPE_LINE_END: &[u8] = b"\n";

/// Which process model to spawn under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioBackend {
    /// Pseudo-terminal: real terminal semantics. Unix only.
    #[cfg(unix)]
    Pty,
    /// Anonymous pipes: portable, no terminal semantics.
    Pipe,
}

impl StdioBackend {
    /// The platform's native choice: PTY where available, pipes elsewhere.
    pub fn platform_default() -> Self {
        #[cfg(unix)]
        {
            StdioBackend::Pty
        }
        #[cfg(not(unix))]
        {
            StdioBackend::Pipe
        }
    }
}

/// Everything needed to start one child process.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Environment overlay applied on top of the parent environment.
    /// Keys are unique; a later value replaces an earlier one.
    pub env: Vec<(String, String)>,
    pub backend: StdioBackend,
    /// Mask the argument vector in the log header (credentials on the
    /// command line must never reach the log file).
    pub hide_args: bool,
}

impl SpawnSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
            backend: StdioBackend::platform_default(),
            hide_args: false,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set one overlay variable, replacing any existing value for the name.
    pub fn with_env_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_env_var(name.into(), value.into());
        self
    }

    pub fn with_backend(mut self, backend: StdioBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_hidden_args(mut self) -> Self {
        self.hide_args = true;
        self
    }

    pub(crate) fn set_env_var(&mut self, name: String, value: String) {
        if let Some(entry) = self.env.iter_mut().find(|(existing, _)| *existing == name) {
            entry.1 = value;
        } else {
            self.env.push((name, value));
        }
    }

    /// The command line as written to the log header.
    pub fn command_line(&self) -> String {
        let program = self.program.display().to_string();
        if self.args.is_empty() {
            program
        } else if self.hide_args {
            format!("{} <hidden>", program)
        } else {
            format!("{} {}", program, self.args.join(" "))
        }
    }
}

/// Outcome of one bounded read from the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes arrived and were recorded.
    Data(usize),
    /// The output stream ended.
    Eof,
    /// Nothing arrived within the patience window.
    Idle,
}

enum Backend {
    #[cfg(unix)]
    Pty(PtyChild),
    Pipe(PipeChild),
}

/// A spawned child process wired to its output sink.
pub struct ChildProcess {
    backend: Backend,
    sink: OutputSink,
    command: String,
    pid: u32,
}

impl ChildProcess {
    /// Start the child described by `spec`, appending its output to the
    /// suite log at `log_path`.
    pub fn spawn(spec: &SpawnSpec, log_path: &Path) -> Result<Self, HarnessError> {
        let command = spec.command_line();
        let spawn_error = |source| HarnessError::Spawn {
            command: command.clone(),
            source,
        };

        let backend = match spec.backend {
            #[cfg(unix)]
            StdioBackend::Pty => Backend::Pty(
                PtyChild::spawn(
                    &spec.program,
                    &spec.args,
                    spec.working_dir.as_deref(),
                    &spec.env,
                )
                .map_err(spawn_error)?,
            ),
            StdioBackend::Pipe => Backend::Pipe(
                PipeChild::spawn(
                    &spec.program,
                    &spec.args,
                    spec.working_dir.as_deref(),
                    &spec.env,
                )
                .map_err(spawn_error)?,
            ),
        };

        let pid = match &backend {
            #[cfg(unix)]
            Backend::Pty(pty) => pty.pid(),
            Backend::Pipe(pipe) => pipe.pid(),
        };
        tracing::debug!(pid, command = %command, "spawned child process");

        let sink = OutputSink::open(log_path, &command)?;
        Ok(Self {
            backend,
            sink,
            command,
            pid,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command_line(&self) -> &str {
        &self.command
    }

    /// All output bytes observed so far, in arrival order.
    pub fn output(&self) -> &[u8] {
        self.sink.raw()
    }

    /// The accumulated output decoded for diagnostics.
    pub fn logged(&self) -> String {
        self.sink.logged()
    }

    /// Write a line of input to the child. After the child has exited this
    /// is a logged no-op.
    pub async fn send_line(&mut self, text: &str) -> Result<(), HarnessError> {
        if !self.is_running() {
            tracing::warn!(pid = self.pid, text, "send_line after child exit, dropping input");
            return Ok(());
        }

        let mut data = Vec::with_capacity(text.len() + 2);
        data.extend_from_slice(text.as_bytes());
        match &self.backend {
            #[cfg(unix)]
            Backend::Pty(_) => data.push(b'\n'),
            Backend::Pipe(_) => data.extend_from_slice(PIPE_LINE_END),
        }

        match &mut self.backend {
            #[cfg(unix)]
            Backend::Pty(pty) => pty.write(&data).await?,
            Backend::Pipe(pipe) => pipe.write(&data).await?,
        }
        Ok(())
    }

    /// One bounded read: waits up to `patience` for output, records any
    /// bytes that arrive into the sink.
    pub async fn read_chunk(&mut self, patience: Duration) -> Result<ReadOutcome, HarnessError> {
        match &mut self.backend {
            #[cfg(unix)]
            Backend::Pty(pty) => {
                let mut buf = [0u8; 4096];
                match bounded(pty.read(&mut buf), patience).await {
                    Ok(Ok(0)) => Ok(ReadOutcome::Eof),
                    Ok(Ok(n)) => {
                        self.sink.record(&buf[..n])?;
                        Ok(ReadOutcome::Data(n))
                    }
                    Ok(Err(e)) => Err(e.into()),
                    Err(Expired) => Ok(ReadOutcome::Idle),
                }
            }
            Backend::Pipe(pipe) => match bounded(pipe.read(), patience).await {
                Ok(Some(chunk)) => {
                    let n = chunk.len();
                    self.sink.record(&chunk)?;
                    Ok(ReadOutcome::Data(n))
                }
                Ok(None) => Ok(ReadOutcome::Eof),
                Err(Expired) => Ok(ReadOutcome::Idle),
            },
        }
    }

    /// Non-blocking liveness query against the OS. A child the OS no longer
    /// knows about is not running; that is never an error.
    pub fn is_running(&mut self) -> bool {
        self.try_status().is_none()
    }

    fn try_status(&mut self) -> Option<i32> {
        match &mut self.backend {
            #[cfg(unix)]
            Backend::Pty(pty) => pty.try_status(),
            Backend::Pipe(pipe) => pipe.try_status(),
        }
    }

    /// Force the child to stop, releasing its handle. Idempotent.
    ///
    /// PTY backend: quit signal, bounded reap, kill as fallback. Pipe
    /// backend: direct kill (no quit signal exists there). The exit code a
    /// terminated child reports is platform-conditioned; callers must not
    /// assert on it.
    pub async fn terminate(&mut self) -> Result<(), HarnessError> {
        if self.try_status().is_some() {
            return Ok(());
        }
        tracing::debug!(pid = self.pid, "terminating child process");

        match &mut self.backend {
            #[cfg(unix)]
            Backend::Pty(pty) => {
                pty.interrupt(Signal::SIGQUIT)?;
                if pty.reap(TERMINATE_GRACE).await.is_none() {
                    pty.interrupt(Signal::SIGKILL)?;
                    pty.reap(TERMINATE_GRACE).await;
                }
            }
            Backend::Pipe(pipe) => pipe.kill().await?,
        }
        Ok(())
    }

    /// Block until the child exits, draining output so a chatty child can
    /// never stall on a full PTY or pipe buffer. On timeout the child is
    /// terminated and the failure carries the accumulated log.
    pub async fn wait(&mut self, limit: Duration) -> Result<i32, HarnessError> {
        match bounded(self.exit_and_drain(), limit).await {
            Ok(result) => result,
            Err(Expired) => {
                self.terminate().await?;
                Err(HarnessError::Timeout {
                    operation: "waiting for the child to exit".to_string(),
                    output: self.logged(),
                })
            }
        }
    }

    async fn exit_and_drain(&mut self) -> Result<i32, HarnessError> {
        loop {
            if let Some(code) = self.try_status() {
                // Pick up whatever was still buffered when the child exited.
                loop {
                    match self.read_chunk(WAIT_READ_PATIENCE).await? {
                        ReadOutcome::Data(_) => continue,
                        ReadOutcome::Eof | ReadOutcome::Idle => break,
                    }
                }
                return Ok(code);
            }
            self.read_chunk(WAIT_READ_PATIENCE).await?;
        }
    }
}

#[cfg(test)]
#[path = "child_tests.rs"]
mod tests;
