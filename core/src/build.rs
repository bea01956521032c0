//! Release build of the network-stack executable
//!
//! The build runs synchronously and gates everything that follows: on a
//! non-zero status the whole sequence aborts with that same status, so a
//! stale previously-built artifact is never elevated or launched.

use crate::runner::CommandRunner;
use crate::{CoreError, Result};
use schema::StackSpec;
use tracing::{error, info};

/// Build the stack executable in release mode
///
/// Returns `CoreError::BuildFailed` carrying the build's own exit status
/// when the build fails.
pub async fn build_stack(runner: &dyn CommandRunner, spec: &StackSpec) -> Result<()> {
    info!("Building network stack in {}", spec.manifest_dir.display());

    let outcome = runner
        .run("cargo", &["build", "--release"], Some(&spec.manifest_dir))
        .await?;

    if !outcome.success() {
        error!(
            "Stack build failed with status {}: {}",
            outcome.status,
            outcome.stderr.trim()
        );
        return Err(CoreError::BuildFailed {
            status: outcome.status,
        });
    }

    info!("Stack build completed: {}", spec.artifact_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutcome, ScriptedRunner};
    use std::path::PathBuf;

    fn spec() -> StackSpec {
        StackSpec {
            manifest_dir: PathBuf::from("/opt/netstack"),
            ..StackSpec::default()
        }
    }

    #[tokio::test]
    async fn invokes_cargo_release_build_in_manifest_dir() {
        let runner = ScriptedRunner::new();
        build_stack(&runner, &spec()).await.expect("build");

        let recorded = runner.recorded().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].program, "cargo");
        assert_eq!(recorded[0].args, vec!["build", "--release"]);
        assert_eq!(recorded[0].cwd, Some(PathBuf::from("/opt/netstack")));
    }

    #[tokio::test]
    async fn propagates_build_status_verbatim() {
        let runner = ScriptedRunner::new();
        runner
            .push_outcome(CommandOutcome::failed(101, "error[E0308]"))
            .await;

        let err = build_stack(&runner, &spec()).await.unwrap_err();
        match err {
            CoreError::BuildFailed { status } => assert_eq!(status, 101),
            other => panic!("expected BuildFailed, got: {}", other),
        }
        // The failed build must be the only recorded side effect
        assert_eq!(runner.recorded().await.len(), 1);
    }
}
