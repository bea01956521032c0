//! The supervisor pipeline and lifecycle state machine

use super::{ManagedProcess, ProcessAdapter};
use crate::config::SupervisorConfig;
use crate::netdev::{self, InterfaceWatcher};
use crate::runner::CommandRunner;
use crate::{build, caps, Result};
use schema::{StackExit, SupervisorEvent, SupervisorState};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Signal number forwarded to the stack on shutdown (SIGTERM)
const TERM_SIGNAL: i32 = 15;

/// Drives the stack's lifecycle from build to exit
///
/// The pipeline is strictly linear. Fatal errors (build, capability grant,
/// spawn, interface readiness timeout) abort the remaining stages; the
/// readiness-timeout path additionally terminates and reaps the already
/// spawned child so it is never left running unsupervised.
pub struct Supervisor {
    config: SupervisorConfig,
    runner: Arc<dyn CommandRunner>,
    process_adapter: Arc<dyn ProcessAdapter>,
    event_tx: broadcast::Sender<SupervisorEvent>,
    state: SupervisorState,
}

impl Supervisor {
    /// Create a supervisor from its collaborators
    pub fn new(
        config: SupervisorConfig,
        runner: Arc<dyn CommandRunner>,
        process_adapter: Arc<dyn ProcessAdapter>,
        event_tx: broadcast::Sender<SupervisorEvent>,
    ) -> Self {
        Self {
            config,
            runner,
            process_adapter,
            event_tx,
            state: SupervisorState::Running,
        }
    }

    /// Subscribe to supervisor events
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: SupervisorEvent) {
        // Best-effort: nobody listening is fine
        let _ = self.event_tx.send(event);
    }

    fn set_state(&mut self, to: SupervisorState, reason: Option<String>) {
        let from = self.state;
        if from == to {
            return;
        }
        info!("Supervisor state: {:?} -> {:?}", from, to);
        self.state = to;
        self.emit(SupervisorEvent::state_changed(from, to, reason));
    }

    /// Run the full pipeline with SIGINT/SIGTERM as the shutdown trigger
    ///
    /// Signal streams are registered before anything is spawned, so a
    /// signal arriving at any point after spawn is guaranteed to be seen.
    #[cfg(unix)]
    pub async fn run(self) -> Result<StackExit> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(|e| {
            crate::CoreError::InitializationError(format!(
                "Failed to install SIGINT handler: {}",
                e
            ))
        })?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
            crate::CoreError::InitializationError(format!(
                "Failed to install SIGTERM handler: {}",
                e
            ))
        })?;

        let shutdown = async move {
            tokio::select! {
                _ = sigint.recv() => info!("Interrupt received"),
                _ = sigterm.recv() => info!("Termination request received"),
            }
        };

        self.run_with_shutdown(shutdown).await
    }

    /// Run the full pipeline with an explicit shutdown trigger
    ///
    /// `shutdown` resolving plays the role of signal delivery: the
    /// supervisor forwards exactly one termination request to the stack
    /// and then blocks until the stack has actually exited.
    pub async fn run_with_shutdown(
        mut self,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<StackExit> {
        build::build_stack(self.runner.as_ref(), &self.config.stack).await?;
        self.emit(SupervisorEvent::BuildCompleted {
            manifest_dir: self.config.stack.manifest_dir.display().to_string(),
            timestamp: SupervisorEvent::current_timestamp(),
        });

        let artifact = self.config.stack.artifact_path();
        caps::grant_net_admin(self.runner.as_ref(), &artifact).await?;
        self.emit(SupervisorEvent::CapabilityGranted {
            artifact: artifact.display().to_string(),
            timestamp: SupervisorEvent::current_timestamp(),
        });

        let mut process = self.process_adapter.spawn(&self.config.stack).await?;
        info!("Stack process started with PID {}", process.pid());
        self.emit(SupervisorEvent::process_started(
            process.pid(),
            artifact.display().to_string(),
            self.config.stack.args.clone(),
        ));

        let watcher = InterfaceWatcher::new(self.config.interface.clone());
        match watcher.wait_ready().await {
            Ok(waited) => {
                self.emit(SupervisorEvent::InterfaceReady {
                    interface: self.config.interface.name.clone(),
                    waited_ms: waited.as_millis() as u64,
                    timestamp: SupervisorEvent::current_timestamp(),
                });
                self.configure_interface().await;
            }
            Err(e) => {
                warn!("{}; terminating stack process", e);
                let _ = self.reap(&mut process).await;
                return Err(e);
            }
        }

        self.supervise(process, shutdown).await
    }

    /// Assign the address and bring the link up
    ///
    /// Configuration failures are non-fatal: they are logged and emitted
    /// as warnings, and supervision proceeds regardless.
    async fn configure_interface(&self) {
        let spec = &self.config.interface;

        match netdev::assign_address(self.runner.as_ref(), spec).await {
            Ok(_) => {}
            Err(e) => {
                warn!("Address assignment failed (continuing to supervise): {}", e);
                self.emit(SupervisorEvent::warning(
                    e.to_string(),
                    Some("IFACE_CONFIG".to_string()),
                ));
                return;
            }
        }

        if let Err(e) = netdev::bring_up(self.runner.as_ref(), spec).await {
            warn!("Link bring-up failed (continuing to supervise): {}", e);
            self.emit(SupervisorEvent::warning(
                e.to_string(),
                Some("IFACE_CONFIG".to_string()),
            ));
            return;
        }

        self.emit(SupervisorEvent::InterfaceConfigured {
            interface: spec.name.clone(),
            address: spec.cidr(),
            timestamp: SupervisorEvent::current_timestamp(),
        });
    }

    /// Block until the stack exits, forwarding at most one termination
    /// request when the shutdown trigger fires
    async fn supervise(
        &mut self,
        mut process: Box<dyn ManagedProcess>,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<StackExit> {
        tokio::pin!(shutdown);
        let pid = process.pid();
        let mut forwarded = false;

        let exit = loop {
            if forwarded {
                // Termination already forwarded: only the exit matters now,
                // with SIGKILL as the bounded escalation.
                match tokio::time::timeout(self.config.graceful_timeout(), process.wait()).await {
                    Ok(exit) => break exit?,
                    Err(_) => {
                        warn!(
                            "Stack process {} did not exit within {:?}, sending SIGKILL",
                            pid,
                            self.config.graceful_timeout()
                        );
                        if let Err(e) = process.kill().await {
                            warn!("Failed to kill stack process {}: {}", pid, e);
                        }
                        break process.wait().await?;
                    }
                }
            }

            tokio::select! {
                exit = process.wait() => break exit?,
                _ = &mut shutdown => {
                    self.set_state(
                        SupervisorState::SignalReceived,
                        Some("termination signal received".to_string()),
                    );
                    match process.terminate().await {
                        Ok(()) => {
                            self.emit(SupervisorEvent::signal_forwarded(pid, TERM_SIGNAL));
                        }
                        Err(e) => {
                            // The process may already be gone; the wait below decides
                            warn!("Failed to forward termination to {}: {}", pid, e);
                            self.emit(SupervisorEvent::warning(
                                e.to_string(),
                                Some("SIGNAL_FORWARD".to_string()),
                            ));
                        }
                    }
                    self.set_state(SupervisorState::Terminating, None);
                    forwarded = true;
                }
            }
        };

        info!(
            "Stack process {} exited (code: {:?}, signal: {:?})",
            pid, exit.exit_code, exit.signal
        );
        self.emit(SupervisorEvent::process_exited(exit.clone()));
        self.set_state(SupervisorState::Exited, None);
        Ok(exit)
    }

    /// Terminate and reap an already spawned child after a fatal pipeline
    /// error, so the error path never leaves it running unsupervised
    async fn reap(&mut self, process: &mut Box<dyn ManagedProcess>) -> Result<StackExit> {
        if let Err(e) = process.terminate().await {
            warn!("Failed to terminate stack process {}: {}", process.pid(), e);
        }
        match tokio::time::timeout(self.config.graceful_timeout(), process.wait()).await {
            Ok(exit) => exit,
            Err(_) => {
                if let Err(e) = process.kill().await {
                    warn!("Failed to kill stack process {}: {}", process.pid(), e);
                }
                process.wait().await
            }
        }
    }
}
