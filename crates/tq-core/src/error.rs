//! Core error types for torq
//!
//! Two tiers that are deliberately kept apart:
//!
//! - [`ValidationError`] is an expected domain failure (bad argument
//!   combination, missing user/package/event, unreachable device). It is
//!   returned as a value, checked by the caller, and printed to the user.
//! - [`Fault`] is an unexpected failure (transport malfunction, undeclared
//!   exit status, a device that never reached the awaited state). It
//!   propagates with `?` and ends the current command.
//!
//! Fallible domain operations therefore return `Result<Verdict<T>, Fault>`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Outcome of an operation that can fail with an expected domain error
pub type Verdict<T> = std::result::Result<T, ValidationError>;

/// Result alias for operations that can only fail fatally
pub type Result<T> = std::result::Result<T, Fault>;

/// An expected, user-facing failure with an optional actionable suggestion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    /// Human-readable description of what is wrong
    pub message: String,
    /// Next command or fix to try, if there is one
    pub suggestion: Option<String>,
}

impl ValidationError {
    /// Create an error without a suggestion
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
        }
    }

    /// Create an error carrying a suggestion
    pub fn with_suggestion(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

/// Unrecoverable failures. Never converted into a [`ValidationError`].
#[derive(Error, Debug)]
pub enum Fault {
    /// The transport binary could not be launched
    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exited with a status the caller did not declare as expected
    #[error("`{command}` exited with unexpected status {code}: {stderr}")]
    UnexpectedExit {
        command: String,
        code: i32,
        stderr: String,
    },

    /// The command was terminated by a signal and has no exit status
    #[error("`{command}` was terminated by a signal")]
    Signalled { command: String },

    /// A blocking command exceeded its explicit timeout
    #[error("`{command}` timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    /// A polled device state transition never happened
    #[error("Device with serial {serial} took too long to {operation}.")]
    StateTimeout { serial: String, operation: String },

    /// Device output did not have the shape the parser relies on
    #[error("Unexpected output from `{command}`: {detail}")]
    MalformedOutput { command: String, detail: String },

    /// Host-side filesystem failure
    #[error("I/O error on {path:?}: {source}")]
    HostIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error talking to a child process
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
