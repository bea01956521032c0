//! Tun interface readiness and configuration
//!
//! The stack process creates the tun interface asynchronously after it is
//! spawned, so configuration is gated on an explicit readiness check: a
//! bounded poll for the device's sysfs entry. Once the interface exists,
//! the address is assigned and the link brought up through the `ip` tool.
//!
//! Address assignment is idempotent: `ip addr add` reporting "File exists"
//! means the address is already in place and is treated as success.

use crate::runner::CommandRunner;
use crate::{CoreError, Result};
use schema::InterfaceSpec;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Watches for a tun interface to appear in sysfs
#[derive(Debug, Clone)]
pub struct InterfaceWatcher {
    spec: InterfaceSpec,
}

impl InterfaceWatcher {
    /// Create a watcher for the given interface spec
    pub fn new(spec: InterfaceSpec) -> Self {
        Self { spec }
    }

    fn device_exists(&self) -> bool {
        self.spec.sysfs_root.join(&self.spec.name).exists()
    }

    /// Wait for the interface to appear, polling at the configured
    /// interval up to the configured timeout
    ///
    /// Returns how long the interface took to appear, or
    /// `CoreError::InterfaceTimeout` if the deadline passed first.
    pub async fn wait_ready(&self) -> Result<Duration> {
        let started = Instant::now();
        let deadline = started + self.spec.ready_timeout();

        loop {
            if self.device_exists() {
                let waited = started.elapsed();
                debug!(
                    "Interface '{}' appeared after {} ms",
                    self.spec.name,
                    waited.as_millis()
                );
                return Ok(waited);
            }

            if Instant::now() >= deadline {
                return Err(CoreError::InterfaceTimeout {
                    interface: self.spec.name.clone(),
                    waited_ms: self.spec.ready_timeout_ms,
                });
            }

            sleep(self.spec.poll_interval()).await;
        }
    }
}

/// Assign the configured address to the interface
///
/// Returns `Ok(true)` when the address was newly assigned and `Ok(false)`
/// when it was already present (idempotent re-run). Any other `ip` failure
/// is an `InterfaceError`.
pub async fn assign_address(runner: &dyn CommandRunner, spec: &InterfaceSpec) -> Result<bool> {
    let cidr = spec.cidr();
    info!("Assigning {} to interface '{}'", cidr, spec.name);

    let outcome = runner
        .run("ip", &["addr", "add", &cidr, "dev", &spec.name], None)
        .await?;

    if outcome.success() {
        return Ok(true);
    }

    if outcome.stderr.contains("File exists") {
        debug!("Address {} already assigned to '{}'", cidr, spec.name);
        return Ok(false);
    }

    Err(CoreError::InterfaceError(format!(
        "ip addr add {} dev {} exited with status {}: {}",
        cidr,
        spec.name,
        outcome.status,
        outcome.stderr.trim()
    )))
}

/// Administratively bring the interface up
pub async fn bring_up(runner: &dyn CommandRunner, spec: &InterfaceSpec) -> Result<()> {
    info!("Bringing interface '{}' up", spec.name);

    let outcome = runner
        .run("ip", &["link", "set", "up", "dev", &spec.name], None)
        .await?;

    if !outcome.success() {
        return Err(CoreError::InterfaceError(format!(
            "ip link set up dev {} exited with status {}: {}",
            spec.name,
            outcome.status,
            outcome.stderr.trim()
        )));
    }

    Ok(())
}
