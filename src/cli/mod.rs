//! Command-line interface
//!
//! Argument parsing for the `datum` binary.

pub mod commands;

pub use commands::{Command, Opt};
