//! Schema definitions for tunup
//!
//! This crate contains the shared data structures used across the tunup
//! supervisor: the specification of the network stack to build and launch,
//! the virtual interface configuration, lifecycle state, and the events
//! emitted while supervising. All types implement JSON Schema generation
//! for external consumption.

pub mod events;
pub mod stack;


pub use events::SupervisorEvent;
pub use stack::{InterfaceSpec, StackExit, StackSpec, SupervisorState};
