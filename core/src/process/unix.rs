//! Unix process management with safe spawn/kill using process groups
//!
//! The stack executable is spawned into its own process group (via
//! `setsid()`), so termination signals can target the whole group without
//! touching the supervisor. SIGTERM is used for graceful termination,
//! SIGKILL as the escalation when the graceful timeout expires.
//!
//! Signal-path errors where the target is already gone (`ESRCH`, and
//! `EPERM` from PID reuse after exit) are treated as success: the process
//! may simply have exited on its own before the signal arrived.

// Allow unsafe code for this module since process management requires libc::setsid() calls
#![allow(unsafe_code)]

use crate::{CoreError, Result};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, error, warn};

/// A child process managed with Unix process groups
///
/// The process is guaranteed to be in its own process group, allowing the
/// supervisor to signal the entire process tree reliably.
#[derive(Debug)]
pub struct ChildProcess {
    /// The process ID of the spawned process
    pid: Pid,
    /// The underlying Child handle for waiting and status checking
    child: Child,
}

impl ChildProcess {
    /// Get the process ID
    pub fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Get the process group ID (same as PID for session leaders)
    pub fn pgid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Wait for the process to exit and return its exit status (async)
    ///
    /// The wait does not return before the process has actually terminated.
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        self.child.wait().await.map_err(|e| {
            CoreError::ProcessWait(format!("Failed to wait for process {}: {}", self.pid, e))
        })
    }

    /// Try to wait for the process to exit without blocking
    pub fn try_wait(&mut self) -> Result<Option<std::process::ExitStatus>> {
        self.child.try_wait().map_err(|e| {
            CoreError::ProcessWait(format!(
                "Failed to try_wait for process {}: {}",
                self.pid, e
            ))
        })
    }
}

/// Spawn the stack executable as a background child in its own process group
///
/// Stdout and stderr are inherited so the stack logs straight to the
/// supervisor's console; stdin is closed. The child is detached into a new
/// session via `setsid()` in `pre_exec`.
pub fn spawn(
    program: &Path,
    args: &[String],
    environment: &HashMap<String, String>,
) -> Result<ChildProcess> {
    debug!("Spawning stack process: {} {:?}", program.display(), args);

    let mut command = Command::new(program);
    command.args(args).envs(environment).stdin(Stdio::null());

    // Safety: setsid() is async-signal-safe and appropriate for use in pre_exec
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = command.spawn().map_err(|e| {
        error!("Failed to spawn '{}': {}", program.display(), e);
        CoreError::SpawnError(format!("Failed to spawn '{}': {}", program.display(), e))
    })?;

    let raw_pid = child
        .id()
        .ok_or_else(|| CoreError::SpawnError("Spawned child did not have a PID".to_string()))?;
    let pid = Pid::from_raw(raw_pid as i32);
    debug!("Spawned stack process {} in new process group", pid);

    Ok(ChildProcess { pid, child })
}

fn signal_group(child: &ChildProcess, signal: Signal) -> Result<()> {
    debug!("Sending {} to process group {}", signal, child.pid);

    match killpg(child.pid, signal) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => {
            // Process group doesn't exist, which means it already exited
            debug!("Process group {} already exited", child.pid);
            Ok(())
        }
        Err(nix::errno::Errno::EPERM) => {
            debug!(
                "Permission denied signaling process group {} (likely already exited)",
                child.pid
            );
            Ok(())
        }
        Err(e) => {
            error!(
                "Failed to send {} to process group {}: {}",
                signal, child.pid, e
            );
            Err(CoreError::ProcessSignal(format!(
                "Failed to send {} to process group {}: {}",
                signal, child.pid, e
            )))
        }
    }
}

/// Send SIGTERM to the process group for graceful termination
pub fn signal_term_group(child: &ChildProcess) -> Result<()> {
    signal_group(child, Signal::SIGTERM)
}

/// Send SIGKILL to the process group for forceful termination
pub fn signal_kill_group(child: &ChildProcess) -> Result<()> {
    signal_group(child, Signal::SIGKILL)
}

/// Graceful termination with timeout fallback to SIGKILL
///
/// Sends SIGTERM to the process group, waits up to `timeout` for the exit,
/// and escalates to SIGKILL if the process is still running afterwards.
pub async fn terminate_with_timeout(
    child: &mut ChildProcess,
    timeout: Duration,
) -> Result<std::process::ExitStatus> {
    signal_term_group(child)?;

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            let status = status?;
            debug!("Process {} exited gracefully: {}", child.pid, status);
            Ok(status)
        }
        Err(_) => {
            warn!(
                "Process {} did not exit within {:?}, sending SIGKILL",
                child.pid, timeout
            );
            signal_kill_group(child)?;
            child.wait().await
        }
    }
}
