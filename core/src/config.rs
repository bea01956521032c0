//! Configuration loading and validation for the tunup supervisor
//!
//! This module parses a TOML configuration into the schema spec types,
//! applies defaults (via serde defaults on schema types) so an empty file
//! reproduces the fixed literals of the original setup (tun0,
//! 192.168.0.1/24, release build), and performs strict validation with
//! field-path error messages.

use crate::{CoreError, Result};
use schema::{InterfaceSpec, StackSpec};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level TOML structure for the supervisor configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorConfig {
    /// The network stack to build and launch
    #[serde(default)]
    pub stack: StackSpec,

    /// The tun interface the stack is expected to create
    #[serde(default)]
    pub interface: InterfaceSpec,

    /// Maximum time to wait for graceful shutdown before using SIGKILL
    #[serde(default = "default_graceful_timeout_secs")]
    pub graceful_timeout_secs: u64,
}

impl SupervisorConfig {
    /// Get the graceful timeout as a Duration
    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_timeout_secs)
    }

    /// Validate the configuration and return `Result<()>` with field-path errors
    pub fn validate(&self) -> Result<()> {
        if self.stack.binary.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "stack.binary: cannot be empty".to_string(),
            ));
        }
        if self.stack.binary.contains('/') {
            return Err(CoreError::ValidationError(
                "stack.binary: must be a bare binary name, not a path".to_string(),
            ));
        }

        if self.interface.name.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "interface.name: cannot be empty".to_string(),
            ));
        }
        if self.interface.name.contains('/') || self.interface.name.contains(char::is_whitespace) {
            return Err(CoreError::ValidationError(format!(
                "interface.name: '{}' is not a valid interface name",
                self.interface.name
            )));
        }
        if self.interface.prefix_len == 0 || self.interface.prefix_len > 32 {
            return Err(CoreError::ValidationError(format!(
                "interface.prefixLen: must be 1..=32, got {}",
                self.interface.prefix_len
            )));
        }
        if self.interface.poll_interval_ms == 0 {
            return Err(CoreError::ValidationError(
                "interface.pollIntervalMs: must be greater than 0".to_string(),
            ));
        }
        if self.interface.ready_timeout_ms < self.interface.poll_interval_ms {
            return Err(CoreError::ValidationError(
                "interface.readyTimeoutMs: must be at least pollIntervalMs".to_string(),
            ));
        }

        if self.graceful_timeout_secs == 0 {
            return Err(CoreError::ValidationError(
                "gracefulTimeoutSecs: must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stack: StackSpec::default(),
            interface: InterfaceSpec::default(),
            graceful_timeout_secs: default_graceful_timeout_secs(),
        }
    }
}

const fn default_graceful_timeout_secs() -> u64 {
    5
}

/// Load the supervisor config from a TOML file path
pub fn load_config_from_toml_path(path: impl AsRef<Path>) -> Result<SupervisorConfig> {
    let data = fs::read_to_string(&path).map_err(|e| {
        CoreError::ConfigurationError(format!("Failed to read config {:?}: {}", path.as_ref(), e))
    })?;
    load_config_from_toml_str(&data)
}

/// Load the supervisor config from a TOML string
pub fn load_config_from_toml_str(input: &str) -> Result<SupervisorConfig> {
    let cfg: SupervisorConfig = toml::from_str(input)
        .map_err(|e| CoreError::ConfigurationError(format!("TOML parse error: {}", e)))?;
    cfg.validate()?;
    Ok(cfg)
}
