// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Anonymous-pipe child process backend.
//!
//! The portable process model, and the only one available on Windows: no
//! terminal semantics (echo, line discipline), just piped stdio. Stdout and
//! stderr are pumped by detached reader tasks into a single channel so the
//! child can never block on a full pipe while the test is busy elsewhere.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

/// A child process speaking over anonymous pipes.
pub struct PipeChild {
    child: Child,
    stdin: Option<ChildStdin>,
    output: mpsc::UnboundedReceiver<Vec<u8>>,
    pid: u32,
    status: Option<i32>,
}

impl PipeChild {
    pub fn spawn(
        program: &Path,
        args: &[String],
        working_dir: Option<&Path>,
        env: &[(String, String)],
    ) -> std::io::Result<Self> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }
        for (name, value) in env {
            command.env(name, value);
        }

        let mut child = command.spawn()?;
        let pid = child.id().unwrap_or(0);
        let stdin = child.stdin.take();

        let (tx, output) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, tx));
        }

        Ok(Self {
            child,
            stdin,
            output,
            pid,
            status: None,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Next chunk of output, in arrival order across stdout and stderr.
    /// `None` means both streams reached end of stream.
    pub async fn read(&mut self) -> Option<Vec<u8>> {
        self.output.recv().await
    }

    pub async fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => {
                stdin.write_all(data).await?;
                stdin.flush().await
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "child stdin is closed",
            )),
        }
    }

    /// Non-blocking status query; caches the exit code once the child has
    /// been collected.
    pub fn try_status(&mut self) -> Option<i32> {
        if self.status.is_some() {
            return self.status;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.status = Some(exit_code_of(status));
                self.status
            }
            Ok(None) => None,
            // The handle is gone: nothing left to observe, treat as exited.
            Err(_) => {
                self.status = Some(-1);
                self.status
            }
        }
    }

    /// Direct termination: no quit signal exists for this process model.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        if self.try_status().is_some() {
            return Ok(());
        }
        // The child may exit between the status check and the kill.
        let _ = self.child.start_kill();
        let status = self.child.wait().await?;
        self.status = Some(exit_code_of(status));
        Ok(())
    }
}

/// Forward one stream into the shared output channel until EOF.
async fn pump<R: AsyncRead + Unpin>(mut stream: R, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
        }
    }
}

fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    1
}
