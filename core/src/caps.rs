//! Network-admin capability grant for the built artifact
//!
//! Attaches `cap_net_admin` in effective+inheritable+permitted form to the
//! stack executable so the child can manipulate interfaces without running
//! as root. The grant mutates file metadata and is idempotent; a failing
//! grant is fatal, since a stack launched without the capability cannot
//! hold its tun device.

use crate::runner::CommandRunner;
use crate::{CoreError, Result};
use std::path::Path;
use tracing::info;

/// Capability set requested on the stack artifact
pub const NET_ADMIN_CAPS: &str = "cap_net_admin+eip";

/// Attach the network-admin capability to the artifact at `path`
pub async fn grant_net_admin(runner: &dyn CommandRunner, path: &Path) -> Result<()> {
    let artifact = path.to_string_lossy();
    info!("Granting {} to {}", NET_ADMIN_CAPS, artifact);

    let outcome = runner
        .run("setcap", &[NET_ADMIN_CAPS, &artifact], None)
        .await?;

    if !outcome.success() {
        return Err(CoreError::CapabilityError(format!(
            "setcap {} {} exited with status {}: {}",
            NET_ADMIN_CAPS,
            artifact,
            outcome.status,
            outcome.stderr.trim()
        )));
    }

    Ok(())
}
