//! Command runner abstraction for external tooling
//!
//! The supervisor drives three external command surfaces: `cargo` for the
//! release build, `setcap` for the capability grant, and `ip` for interface
//! configuration. This module provides a trait over those invocations,
//! enabling testing with a scripted implementation that records every call.

use crate::{CoreError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tracing::debug;

/// Outcome of an external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit status of the command (-1 if killed by a signal)
    pub status: i32,
    /// Captured standard error output
    pub stderr: String,
}

impl CommandOutcome {
    /// Successful outcome with no diagnostics
    pub fn ok() -> Self {
        Self {
            status: 0,
            stderr: String::new(),
        }
    }

    /// Failed outcome with the given status and stderr text
    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status zero
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Trait for running external commands in a testable way
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, optionally in `cwd`, and wait for it to
    /// finish. Stdout is passed through to the console; stderr is captured
    /// for diagnostics and outcome classification.
    async fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>)
        -> Result<CommandOutcome>;
}

/// Command runner backed by real processes via tokio
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    /// Create a new system command runner
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<CommandOutcome> {
        debug!("Running command: {} {:?} (cwd: {:?})", program, args, cwd);

        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| CoreError::CommandError(format!("Failed to run '{}': {}", program, e)))?;

        let output = child.wait_with_output().await.map_err(|e| {
            CoreError::CommandError(format!("Failed to wait for '{}': {}", program, e))
        })?;

        let status = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!("Command '{}' exited with status {}", program, status);

        Ok(CommandOutcome { status, stderr })
    }
}

/// A single invocation recorded by [`ScriptedRunner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    /// Program that was requested
    pub program: String,
    /// Arguments it was given
    pub args: Vec<String>,
    /// Working directory, if one was requested
    pub cwd: Option<PathBuf>,
}

/// Scripted command runner for testing
///
/// Records every invocation and replays queued outcomes in order; once the
/// queue is exhausted every further command succeeds.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    outcomes: Arc<tokio::sync::Mutex<VecDeque<CommandOutcome>>>,
    recorded: Arc<tokio::sync::Mutex<Vec<RecordedCommand>>>,
}

impl ScriptedRunner {
    /// Create a runner where every command succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next unscripted invocation
    pub async fn push_outcome(&self, outcome: CommandOutcome) {
        self.outcomes.lock().await.push_back(outcome);
    }

    /// Snapshot of all invocations recorded so far
    pub async fn recorded(&self) -> Vec<RecordedCommand> {
        self.recorded.lock().await.clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<CommandOutcome> {
        self.recorded.lock().await.push(RecordedCommand {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: cwd.map(Path::to_path_buf),
        });

        let outcome = self
            .outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(CommandOutcome::ok);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn system_runner_reports_success() {
        let runner = SystemCommandRunner::new();
        let outcome = runner.run("true", &[], None).await.expect("run true");
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn system_runner_reports_failure_status() {
        let runner = SystemCommandRunner::new();
        let outcome = runner.run("false", &[], None).await.expect("run false");
        assert_eq!(outcome.status, 1);
    }

    #[tokio::test]
    async fn system_runner_captures_stderr() {
        let runner = SystemCommandRunner::new();
        let outcome = runner
            .run("sh", &["-c", "echo nope >&2; exit 3"], None)
            .await
            .expect("run sh");
        assert_eq!(outcome.status, 3);
        assert_eq!(outcome.stderr.trim(), "nope");
    }

    #[tokio::test]
    async fn system_runner_errors_on_missing_program() {
        let runner = SystemCommandRunner::new();
        let result = runner.run("definitely-not-a-command-12345", &[], None).await;
        assert!(matches!(result, Err(CoreError::CommandError(_))));
    }

    #[tokio::test]
    async fn scripted_runner_records_and_replays() {
        let runner = ScriptedRunner::new();
        runner.push_outcome(CommandOutcome::failed(2, "boom")).await;

        let first = runner
            .run("ip", &["addr", "add"], None)
            .await
            .expect("scripted run");
        assert_eq!(first.status, 2);

        // Queue exhausted: defaults to success
        let second = runner.run("ip", &["link"], None).await.expect("run");
        assert!(second.success());

        let recorded = runner.recorded().await;
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].program, "ip");
        assert_eq!(recorded[0].args, vec!["addr", "add"]);
        assert_eq!(recorded[1].args, vec!["link"]);
    }
}
