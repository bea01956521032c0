//! Core error types and utilities

use thiserror::Error;

/// Core-specific error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Stack build failed with status {status}")]
    BuildFailed { status: i32 },

    #[error("Capability grant failed: {0}")]
    CapabilityError(String),

    #[error("Failed to spawn network stack: {0}")]
    SpawnError(String),

    #[error("Interface '{interface}' did not appear within {waited_ms} ms")]
    InterfaceTimeout { interface: String, waited_ms: u64 },

    #[error("Interface configuration error: {0}")]
    InterfaceError(String),

    #[error("Command error: {0}")]
    CommandError(String),

    #[error("Process signal error: {0}")]
    ProcessSignal(String),

    #[error("Process wait error: {0}")]
    ProcessWait(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Other(String),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ConfigurationError(_) => "TUN001",
            CoreError::ValidationError(_) => "TUN002",
            CoreError::InitializationError(_) => "TUN003",
            CoreError::BuildFailed { .. } => "TUN004",
            CoreError::CapabilityError(_) => "TUN005",
            CoreError::SpawnError(_) => "TUN006",
            CoreError::InterfaceTimeout { .. } => "TUN007",
            CoreError::InterfaceError(_) => "TUN008",
            CoreError::CommandError(_) => "TUN009",
            CoreError::ProcessSignal(_) => "TUN010",
            CoreError::ProcessWait(_) => "TUN011",
            CoreError::IoError(_) => "TUN012",
            CoreError::Other(_) => "TUN999",
        }
    }

    /// Map the error to the process exit status the supervisor should
    /// surface for it
    ///
    /// Build failures propagate the build's own status verbatim; every
    /// other fatal category gets a distinct code so callers can tell the
    /// failure stages apart.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::BuildFailed { status } => *status,
            CoreError::ConfigurationError(_) | CoreError::ValidationError(_) => 2,
            CoreError::CapabilityError(_) => 20,
            CoreError::SpawnError(_) => 21,
            CoreError::InterfaceTimeout { .. } => 22,
            _ => 1,
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

// Convenience implementations
impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        CoreError::Other(s.to_string())
    }
}

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        CoreError::Other(s)
    }
}
