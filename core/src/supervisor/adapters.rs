//! Process adapters for abstracting process management
//!
//! This module provides traits and implementations for abstracting the
//! stack process's lifecycle, enabling testing with a mock implementation
//! that never touches the operating system.

use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::{StackExit, StackSpec, SupervisorEvent};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Trait for spawning the stack process in a platform-agnostic way
#[async_trait]
pub trait ProcessAdapter: Send + Sync {
    /// Spawn the built stack artifact according to the spec
    async fn spawn(&self, spec: &StackSpec) -> Result<Box<dyn ManagedProcess>>;
}

/// Trait representing the spawned stack process
///
/// This is the single-owner handle for the child: the PID is written once
/// at spawn time and only read afterwards, by the termination forward and
/// the final wait.
#[async_trait]
pub trait ManagedProcess: Send + Sync {
    /// Get the process ID
    fn pid(&self) -> u32;

    /// Wait for the process to exit
    ///
    /// Must not return before the process has actually terminated. Must be
    /// cancel safe, so the supervisor can race it against signal arrival.
    async fn wait(&mut self) -> Result<StackExit>;

    /// Forward graceful termination (SIGTERM) to the process
    async fn terminate(&mut self) -> Result<()>;

    /// Kill the process forcefully (SIGKILL)
    async fn kill(&mut self) -> Result<()>;
}

/// Unix process adapter backed by the process-group machinery
#[cfg(unix)]
#[derive(Copy, Clone, Debug, Default)]
pub struct UnixProcessAdapter;

#[cfg(unix)]
impl UnixProcessAdapter {
    /// Create a new Unix process adapter
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
#[async_trait]
impl ProcessAdapter for UnixProcessAdapter {
    async fn spawn(&self, spec: &StackSpec) -> Result<Box<dyn ManagedProcess>> {
        use crate::process::unix;

        let artifact = spec.artifact_path();
        debug!("Spawning stack: {} {:?}", artifact.display(), spec.args);

        let child = unix::spawn(&artifact, &spec.args, &spec.environment)?;
        Ok(Box::new(UnixManagedProcess { child }))
    }
}

/// Unix managed process implementation
#[cfg(unix)]
struct UnixManagedProcess {
    child: crate::process::unix::ChildProcess,
}

#[cfg(unix)]
#[async_trait]
impl ManagedProcess for UnixManagedProcess {
    fn pid(&self) -> u32 {
        self.child.pid()
    }

    async fn wait(&mut self) -> Result<StackExit> {
        let exit_status = self.child.wait().await?;

        let (exit_code, signal) = if let Some(code) = exit_status.code() {
            (Some(code), None)
        } else {
            use std::os::unix::process::ExitStatusExt;
            (None, exit_status.signal())
        };

        Ok(StackExit {
            pid: self.pid(),
            exit_code,
            signal,
            timestamp: SupervisorEvent::current_timestamp(),
        })
    }

    async fn terminate(&mut self) -> Result<()> {
        crate::process::unix::signal_term_group(&self.child)
    }

    async fn kill(&mut self) -> Result<()> {
        crate::process::unix::signal_kill_group(&self.child)
    }
}

/// Instructions for mock process behavior
#[derive(Debug, Clone, Copy)]
pub struct MockInstruction {
    /// How long to wait before the process "exits" on its own
    pub exit_delay: std::time::Duration,
    /// Exit code to return on natural exit
    pub exit_code: Option<i32>,
    /// Signal to report on natural exit (for simulating crashes)
    pub signal: Option<i32>,
    /// Whether a forwarded SIGTERM makes the process exit
    pub responds_to_term: bool,
}

impl Default for MockInstruction {
    fn default() -> Self {
        Self {
            exit_delay: std::time::Duration::from_millis(100),
            exit_code: Some(0),
            signal: None,
            responds_to_term: true,
        }
    }
}

/// Mock process adapter for testing
///
/// Replays queued instructions for each spawned process and counts spawn,
/// terminate, and kill calls so tests can assert side-effect ordering and
/// the exactly-once termination forward.
#[derive(Debug, Clone, Default)]
pub struct MockProcessAdapter {
    instructions: Arc<tokio::sync::Mutex<Vec<MockInstruction>>>,
    fail_spawns: Arc<AtomicBool>,
    spawns: Arc<AtomicUsize>,
    terminations: Arc<AtomicUsize>,
    kills: Arc<AtomicUsize>,
}

impl MockProcessAdapter {
    /// Create a new mock adapter with default instructions
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue instructions for the next spawned process
    pub async fn add_instruction(&self, instruction: MockInstruction) {
        self.instructions.lock().await.push(instruction);
    }

    /// Make every subsequent spawn fail
    pub fn fail_spawns(&self) {
        self.fail_spawns.store(true, Ordering::SeqCst);
    }

    /// Number of spawn calls made so far
    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    /// Number of terminate calls made so far
    pub fn terminate_count(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    /// Number of kill calls made so far
    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessAdapter for MockProcessAdapter {
    async fn spawn(&self, spec: &StackSpec) -> Result<Box<dyn ManagedProcess>> {
        debug!("Spawning mock process for: {:?}", spec.artifact_path());

        if self.fail_spawns.load(Ordering::SeqCst) {
            return Err(CoreError::SpawnError(format!(
                "No such file or directory: {}",
                spec.artifact_path().display()
            )));
        }
        self.spawns.fetch_add(1, Ordering::SeqCst);

        let mut instructions = self.instructions.lock().await;
        let instruction = if instructions.is_empty() {
            MockInstruction::default()
        } else {
            instructions.remove(0)
        };

        let pid = rand::random::<u32>() % 64512 + 1024;
        Ok(Box::new(MockManagedProcess {
            pid,
            instruction,
            started_at: std::time::Instant::now(),
            terminated: false,
            killed: false,
            terminations: self.terminations.clone(),
            kills: self.kills.clone(),
        }))
    }
}

/// Mock managed process for testing
struct MockManagedProcess {
    pid: u32,
    instruction: MockInstruction,
    started_at: std::time::Instant,
    terminated: bool,
    killed: bool,
    terminations: Arc<AtomicUsize>,
    kills: Arc<AtomicUsize>,
}

impl MockManagedProcess {
    fn should_exit(&self) -> bool {
        if self.killed {
            return true;
        }
        if self.terminated && self.instruction.responds_to_term {
            return true;
        }
        self.started_at.elapsed() >= self.instruction.exit_delay
    }

    fn create_exit(&self) -> StackExit {
        let (exit_code, signal) = if self.killed {
            (None, Some(9))
        } else if self.terminated && self.instruction.responds_to_term {
            (None, Some(15))
        } else {
            (self.instruction.exit_code, self.instruction.signal)
        };

        StackExit {
            pid: self.pid,
            exit_code,
            signal,
            timestamp: SupervisorEvent::current_timestamp(),
        }
    }
}

#[async_trait]
impl ManagedProcess for MockManagedProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn wait(&mut self) -> Result<StackExit> {
        while !self.should_exit() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        Ok(self.create_exit())
    }

    async fn terminate(&mut self) -> Result<()> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        self.terminated = true;
        Ok(())
    }

    async fn kill(&mut self) -> Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.killed = true;
        Ok(())
    }
}
