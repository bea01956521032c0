//! Lifecycle supervision for the network stack
//!
//! This module drives the supervisor's linear pipeline and the lifecycle
//! state machine around the spawned stack process:
//!
//! ```text
//! build → grant capability → spawn → wait for interface → configure → supervise
//! ```
//!
//! Fatal stage failures (build, grant, spawn, interface never appearing)
//! short-circuit the sequence; interface configuration failures are
//! non-fatal and never prevent supervision, since leaving the stack
//! running unsupervised is worse than a misconfigured interface.
//!
//! ## Components
//!
//! - [`ProcessAdapter`] / [`ManagedProcess`]: traits abstracting process
//!   management, with Unix and mock implementations
//! - [`Supervisor`]: the pipeline driver and state machine

pub mod adapters;
pub mod pipeline;

#[cfg(test)]
mod lifecycle_tests;

pub use adapters::*;
pub use pipeline::*;
