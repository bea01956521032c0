//! Process management for the supervised network stack

#[cfg(unix)]
pub mod unix;
