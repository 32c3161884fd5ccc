//! Core domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Stable identifier of one reachable device, as reported by `adb devices`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Serial(pub String);

impl Serial {
    /// Create a new serial
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw serial string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Serial {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Serial {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Shell exit statuses the device layer treats as meaningful
pub struct ExitCode;

impl ExitCode {
    pub const SUCCESS: i32 = 0;
    /// Generic failure; for `ls`, `rm`, `pidof` and `pull` this means "not found"
    pub const FAILURE: i32 = 1;
    /// Command not found
    pub const NOT_FOUND: i32 = 127;
}

/// A blocking command addressed to one endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRequest {
    /// Arguments after the transport's endpoint prefix
    pub args: Vec<String>,
    /// Exit statuses besides 0 that are a normal result for this call
    pub ignore_exit_codes: BTreeSet<i32>,
    /// Whether output is interesting to the caller (controls logging only)
    pub capture_output: bool,
    /// Data written to the command's stdin
    pub input: Option<String>,
    /// Upper bound for the call; `None` blocks indefinitely
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    /// Create a request from an argument list
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Declare an exit status as a normal, non-fatal result
    pub fn ignore(mut self, code: i32) -> Self {
        self.ignore_exit_codes.insert(code);
        self
    }

    /// Mark the output as consumed by the caller
    pub fn capture(mut self) -> Self {
        self.capture_output = true;
        self
    }

    /// Feed `input` to the command's stdin
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Bound the call by `timeout`
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether `code` is an acceptable exit status for this request
    pub fn accepts(&self, code: i32) -> bool {
        code == ExitCode::SUCCESS || self.ignore_exit_codes.contains(&code)
    }

    /// Arguments joined with spaces, for logs and error messages
    pub fn display(&self) -> String {
        self.args.join(" ")
    }
}

/// Raw result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// Output with only an exit status
    pub fn status(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Default::default()
        }
    }

    /// Stdout decoded lossily as UTF-8
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr decoded lossily as UTF-8
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Whether the command exited with status 0
    pub fn succeeded(&self) -> bool {
        self.exit_code == ExitCode::SUCCESS
    }
}
