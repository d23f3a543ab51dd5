// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pseudo-terminal child process backend (Unix).
//!
//! Forks the target binary under a fresh PTY so interactive prompts (masked
//! password entry, confirmation questions) behave exactly as in a real
//! terminal, and provides async read/write on the master side.

use std::collections::HashMap;
use std::ffi::{CString, OsString};
use std::os::fd::OwnedFd;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::pty::{forkpty, Winsize};
use nix::sys::signal::{kill, signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{AccessFlags, ForkResult, Pid};
use tokio::io::unix::AsyncFd;

use crate::bounded::bounded_blocking;

const PTY_ROWS: u16 = 24;
const PTY_COLS: u16 = 80;

/// Exit code recorded when the child was reaped by an abandoned blocking
/// waiter and the real code is unknown. Only reachable after a wait already
/// timed out, so nothing asserts on it.
const STATUS_COLLECTED_ELSEWHERE: i32 = -1;

/// A child process running under a pseudo-terminal.
pub struct PtyChild {
    master: AsyncFd<OwnedFd>,
    pid: Pid,
    status: Option<i32>,
}

impl PtyChild {
    /// Fork the target under a new PTY and exec it.
    ///
    /// The executable is pre-flighted so a missing or non-executable binary
    /// fails here rather than as an opaque exec failure inside the child.
    /// argv, the merged environment, and the working directory are all
    /// prepared before the fork; between fork and exec the child only makes
    /// raw syscalls (the test binary has other threads at fork time, so the
    /// child must not touch the allocator).
    pub fn spawn(
        program: &Path,
        args: &[String],
        working_dir: Option<&Path>,
        env: &[(String, String)],
    ) -> std::io::Result<Self> {
        let resolved = resolve_executable(program)?;
        let argv = build_argv(&resolved, args)?;
        let envp = build_envp(env)?;
        let chdir_to = working_dir
            .map(|dir| cstring(dir.as_os_str().as_bytes()))
            .transpose()?;

        let winsize = Winsize {
            ws_row: PTY_ROWS,
            ws_col: PTY_COLS,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        // SAFETY: forkpty creates a new PTY and forks; the child execs
        // immediately, so no state is shared past this call.
        let forked = unsafe { forkpty(&winsize, None) }.map_err(io_error)?;

        match forked.fork_result {
            ForkResult::Child => {
                // SAFETY: restoring SIGPIPE to default before exec is safe.
                unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl).ok() };

                if let Some(dir) = &chdir_to {
                    if nix::unistd::chdir(dir.as_c_str()).is_err() {
                        // SAFETY: _exit is the only safe way out of a forked
                        // child that cannot exec.
                        unsafe { nix::libc::_exit(127) };
                    }
                }

                let _ = nix::unistd::execve(&argv[0], &argv, &envp);
                // SAFETY: as above.
                unsafe { nix::libc::_exit(127) };
            }
            ForkResult::Parent { child } => {
                set_non_blocking(&forked.master).map_err(io_error)?;
                let master = AsyncFd::new(forked.master)?;

                Ok(Self {
                    master,
                    pid: child,
                    status: None,
                })
            }
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Read output from the PTY (the child's merged stdout/stderr).
    /// Returns 0 at end of stream.
    pub async fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            let mut guard = self.master.readable().await?;
            match read_nonblocking(&self.master, buf).map_err(io_error)? {
                Some(n) => return Ok(n),
                None => guard.clear_ready(),
            }
        }
    }

    /// Write input to the PTY (delivered to the child's stdin).
    pub async fn write(&self, data: &[u8]) -> std::io::Result<()> {
        let mut written = 0;
        while written < data.len() {
            let mut guard = self.master.writable().await?;
            match write_nonblocking(&self.master, &data[written..]).map_err(io_error)? {
                Some(n) => written += n,
                None => guard.clear_ready(),
            }
        }
        Ok(())
    }

    /// Deliver a signal to the child. A child that is already gone is not
    /// an error.
    pub fn interrupt(&self, sig: Signal) -> std::io::Result<()> {
        match kill(self.pid, sig) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }

    /// Non-blocking status query. Reaps the child if it has exited and
    /// caches the exit code; a reaped or vanished child is "exited", never
    /// an error.
    pub fn try_status(&mut self) -> Option<i32> {
        if self.status.is_some() {
            return self.status;
        }
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => None,
            Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => {
                self.status = Some(exit_code_of(status));
                self.status
            }
            Ok(_) => None,
            Err(Errno::ECHILD) => {
                self.status = Some(STATUS_COLLECTED_ELSEWHERE);
                self.status
            }
            Err(_) => None,
        }
    }

    /// Blocking reap on a worker, joined with a deadline. Returns the exit
    /// code, or `None` when the deadline was missed (the worker is
    /// abandoned; a later reap tolerates it via ECHILD).
    pub async fn reap(&mut self, limit: Duration) -> Option<i32> {
        if self.status.is_some() {
            return self.status;
        }
        let pid = self.pid;
        match bounded_blocking(move || waitpid(pid, None), limit).await {
            Ok(Ok(status)) => self.status = Some(exit_code_of(status)),
            Ok(Err(Errno::ECHILD)) => self.status = Some(STATUS_COLLECTED_ELSEWHERE),
            Ok(Err(_)) | Err(_) => {}
        }
        self.status
    }
}

impl Drop for PtyChild {
    fn drop(&mut self) {
        // A child that was never waited on must not outlive its handle.
        if self.status.is_none() {
            let _ = kill(self.pid, Signal::SIGKILL);
            let _ = waitpid(self.pid, None);
        }
    }
}

fn exit_code_of(status: WaitStatus) -> i32 {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, sig, _) => 128 + sig as i32,
        _ => 1,
    }
}

/// Resolve `program` to an executable path, searching PATH for bare names.
fn resolve_executable(program: &Path) -> std::io::Result<PathBuf> {
    let is_executable =
        |path: &Path| nix::unistd::access(path, AccessFlags::X_OK).is_ok() && path.is_file();

    if program.components().count() > 1 {
        if is_executable(program) {
            return Ok(program.to_path_buf());
        }
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not an executable file", program.display()),
        ));
    }

    for dir in std::env::split_paths(&std::env::var_os("PATH").unwrap_or_default()) {
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("{} not found on PATH", program.display()),
    ))
}

fn build_argv(program: &Path, args: &[String]) -> std::io::Result<Vec<CString>> {
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(cstring(program.as_os_str().as_bytes())?);
    for arg in args {
        argv.push(cstring(arg.as_bytes())?);
    }
    Ok(argv)
}

/// Parent environment merged with the overlay; overlay keys win. TERM
/// defaults to "dumb" to keep escape-sequence noise out of the raw stream.
fn build_envp(overlay: &[(String, String)]) -> std::io::Result<Vec<CString>> {
    let mut merged: HashMap<OsString, OsString> = std::env::vars_os().collect();
    if !overlay.iter().any(|(name, _)| name == "TERM") {
        merged.insert("TERM".into(), "dumb".into());
    }
    for (name, value) in overlay {
        merged.insert(name.into(), value.into());
    }

    merged
        .iter()
        .map(|(name, value)| {
            let mut pair = name.as_bytes().to_vec();
            pair.push(b'=');
            pair.extend_from_slice(value.as_bytes());
            cstring(&pair)
        })
        .collect()
}

fn cstring(bytes: &[u8]) -> std::io::Result<CString> {
    CString::new(bytes)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "NUL in command line"))
}

fn set_non_blocking(fd: &OwnedFd) -> nix::Result<()> {
    use std::os::fd::AsRawFd;
    let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(flags))?;
    Ok(())
}

/// Read, mapping EAGAIN to `None` and the EIO a closed PTY produces to EOF.
fn read_nonblocking(fd: &AsyncFd<OwnedFd>, buf: &mut [u8]) -> nix::Result<Option<usize>> {
    use std::os::fd::AsRawFd;
    match nix::unistd::read(fd.get_ref().as_raw_fd(), buf) {
        Ok(n) => Ok(Some(n)),
        Err(Errno::EAGAIN) => Ok(None),
        Err(Errno::EIO) => Ok(Some(0)),
        Err(e) => Err(e),
    }
}

/// Write, mapping EAGAIN to `None`.
fn write_nonblocking(fd: &AsyncFd<OwnedFd>, buf: &[u8]) -> nix::Result<Option<usize>> {
    match nix::unistd::write(fd.get_ref(), buf) {
        Ok(n) => Ok(Some(n)),
        Err(Errno::EAGAIN) => Ok(None),
        Err(e) => Err(e),
    }
}

fn io_error(errno: Errno) -> std::io::Error {
    std::io::Error::from_raw_os_error(errno as i32)
}
