//! torq CLI: command-line interface for tracing sessions on Android devices
//!
//! Provides the `torq` binary's command implementations and terminal output.

pub mod commands;
pub mod output;
