//! Core functionality for the tunup supervisor
//!
//! This crate contains the lifecycle logic for preparing, launching, and
//! tearing down a user-space network stack: the release build of the stack
//! executable, the network-admin capability grant, spawning the stack as a
//! background child, waiting for and configuring the tun interface it
//! creates, and signal-driven supervision until the child exits.

pub mod build;
pub mod caps;
pub mod config;
pub mod error;
pub mod netdev;
#[cfg(unix)]
pub mod process;
pub mod runner;
pub mod supervisor;


// Re-export schema types for convenience
pub use schema::*;

pub use config::SupervisorConfig;
pub use error::{CoreError, Result};
pub use runner::{CommandOutcome, CommandRunner, ScriptedRunner, SystemCommandRunner};

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::InitializationError(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
