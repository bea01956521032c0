//! Stack and interface specification types for the tunup supervisor
//!
//! This module contains the core data structures describing what the
//! supervisor builds and launches (the user-space network stack) and the
//! virtual interface it configures once the stack is running.
//!
//! ## Supervisor Lifecycle
//!
//! The supervisor progresses through the following states:
//! - `Running`: the stack process is alive and being supervised
//! - `SignalReceived`: an interrupt or termination request arrived
//! - `Terminating`: the termination request has been forwarded to the stack
//! - `Exited`: the stack process has fully exited

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

/// Specification of the network-stack executable to build and launch
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StackSpec {
    /// Directory containing the stack's Cargo manifest; the release build
    /// runs here and the artifact lands under `target/release`
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: PathBuf,

    /// Name of the release binary to elevate and launch
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Command-line arguments passed to the stack process
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables to set for the stack process
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

impl StackSpec {
    /// Path of the built release artifact
    pub fn artifact_path(&self) -> PathBuf {
        self.manifest_dir
            .join("target")
            .join("release")
            .join(&self.binary)
    }
}

impl Default for StackSpec {
    fn default() -> Self {
        Self {
            manifest_dir: default_manifest_dir(),
            binary: default_binary(),
            args: Vec::new(),
            environment: HashMap::new(),
        }
    }
}

fn default_manifest_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_binary() -> String {
    "netstack".to_string()
}

/// Configuration of the tun interface the stack is expected to create
///
/// The supervisor does not create the interface; it waits for the stack
/// process to bring it into existence, then assigns the address and brings
/// the link up.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceSpec {
    /// Interface name the stack is expected to create
    #[serde(default = "default_interface_name")]
    pub name: String,

    /// IPv4 address to assign to the interface
    #[serde(default = "default_address")]
    pub address: Ipv4Addr,

    /// Prefix length for the assigned address
    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,

    /// Maximum time to wait for the interface to appear after spawning
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    /// Interval between existence checks while waiting for the interface
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Root of the sysfs network-device tree used for existence checks
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
}

impl InterfaceSpec {
    /// Address in CIDR notation, e.g. `192.168.0.1/24`
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.address, self.prefix_len)
    }

    /// Get the readiness timeout as a Duration
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Get the poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for InterfaceSpec {
    fn default() -> Self {
        Self {
            name: default_interface_name(),
            address: default_address(),
            prefix_len: default_prefix_len(),
            ready_timeout_ms: default_ready_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            sysfs_root: default_sysfs_root(),
        }
    }
}

fn default_interface_name() -> String {
    "tun0".to_string()
}

const fn default_address() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 0, 1)
}

const fn default_prefix_len() -> u8 {
    24
}

const fn default_ready_timeout_ms() -> u64 {
    5_000
}

const fn default_poll_interval_ms() -> u64 {
    50
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class/net")
}

/// Current state of the supervisor lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SupervisorState {
    /// Stack process is alive and being supervised
    Running,
    /// An interrupt or termination request has been received
    SignalReceived,
    /// Termination has been forwarded to the stack process
    Terminating,
    /// Stack process has fully exited
    Exited,
}

impl SupervisorState {
    /// Check if the stack process is still expected to be alive
    pub fn is_running(&self) -> bool {
        !matches!(self, SupervisorState::Exited)
    }

    /// Check if shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        matches!(
            self,
            SupervisorState::SignalReceived | SupervisorState::Terminating
        )
    }
}

/// Exit information for the supervised stack process
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StackExit {
    /// Process ID the stack ran under
    pub pid: u32,

    /// Exit code, if the process exited normally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Signal number, if the process was killed by a signal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,

    /// Timestamp of the exit in RFC3339 format
    pub timestamp: String,
}

impl StackExit {
    /// Map the exit information to a process exit status
    ///
    /// Mirrors the child's own exit code; signal deaths map to the shell
    /// convention of `128 + signal`.
    pub fn status_code(&self) -> i32 {
        match (self.exit_code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => 1,
        }
    }

    /// Whether the process exited cleanly with status zero
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}
