//! Event system for the tunup supervisor
//!
//! This module defines the event types emitted as the supervisor walks
//! through its linear pipeline (build, capability grant, spawn, interface
//! configuration) and reacts to signals and process exit.
//!
//! Events are designed to be serializable and can be:
//! - Logged to structured log files
//! - Used for debugging and operational visibility
//! - Broadcast to multiple subscribers via event channels

use crate::stack::{StackExit, SupervisorState};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Events emitted by the supervisor
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "eventType", rename_all = "camelCase")]
pub enum SupervisorEvent {
    /// Supervisor lifecycle state has changed
    StateChanged {
        /// Previous state
        from_state: SupervisorState,
        /// New state
        to_state: SupervisorState,
        /// Event timestamp in RFC3339 format
        timestamp: String,
        /// Optional reason for the state change
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Release build of the stack finished successfully
    BuildCompleted {
        /// Directory the build ran in
        manifest_dir: String,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// Network-admin capability was attached to the built artifact
    CapabilityGranted {
        /// Path of the artifact the capability was attached to
        artifact: String,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// Stack process has started
    ProcessStarted {
        /// Process ID of the started stack
        pid: u32,
        /// Command that was executed
        command: String,
        /// Arguments passed to the command
        args: Vec<String>,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// The expected tun interface has appeared
    InterfaceReady {
        /// Interface name
        interface: String,
        /// How long the supervisor waited for it, in milliseconds
        waited_ms: u64,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// Address assignment and link bring-up completed
    InterfaceConfigured {
        /// Interface name
        interface: String,
        /// Assigned address in CIDR notation
        address: String,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// A termination request was forwarded to the stack process
    SignalForwarded {
        /// Target process ID
        pid: u32,
        /// Signal number that was forwarded
        signal: i32,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// Stack process has exited
    ProcessExited {
        /// Exit information
        exit_info: StackExit,
    },

    /// Non-fatal problem worth surfacing
    Warning {
        /// Human-readable message
        message: String,
        /// Event timestamp in RFC3339 format
        timestamp: String,
        /// Optional machine-readable code
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl SupervisorEvent {
    /// Get the current timestamp in RFC3339 format
    pub fn current_timestamp() -> String {
        humantime::format_rfc3339_seconds(SystemTime::now()).to_string()
    }

    /// Create a state changed event
    #[must_use]
    pub fn state_changed(
        from_state: SupervisorState,
        to_state: SupervisorState,
        reason: Option<String>,
    ) -> Self {
        Self::StateChanged {
            from_state,
            to_state,
            timestamp: Self::current_timestamp(),
            reason,
        }
    }

    /// Create a process started event
    #[must_use]
    pub fn process_started(pid: u32, command: String, args: Vec<String>) -> Self {
        Self::ProcessStarted {
            pid,
            command,
            args,
            timestamp: Self::current_timestamp(),
        }
    }

    /// Create a process exited event
    #[must_use]
    pub fn process_exited(exit_info: StackExit) -> Self {
        Self::ProcessExited { exit_info }
    }

    /// Create a signal forwarded event
    #[must_use]
    pub fn signal_forwarded(pid: u32, signal: i32) -> Self {
        Self::SignalForwarded {
            pid,
            signal,
            timestamp: Self::current_timestamp(),
        }
    }

    /// Create a warning event
    #[must_use]
    pub fn warning(message: String, code: Option<String>) -> Self {
        Self::Warning {
            message,
            timestamp: Self::current_timestamp(),
            code,
        }
    }
}
