//! Transport traits

use crate::error::Result;
use crate::types::{CommandOutput, CommandRequest, Serial};

/// Command channel to one addressed endpoint.
///
/// Every call re-addresses the endpoint explicitly; implementations hold no
/// state beyond the serial they are bound to.
pub trait Transport: Send + Sync {
    /// Serial of the endpoint this transport is bound to
    fn id(&self) -> &Serial;

    /// Run a command to completion.
    ///
    /// Exit statuses not accepted by `request` are returned as a
    /// [`Fault`](crate::error::Fault). A request without a timeout never
    /// times out.
    fn issue(&self, request: &CommandRequest) -> Result<CommandOutput>;

    /// Start a command without waiting for it.
    ///
    /// Failures of the started command only surface when the handle is
    /// stopped or awaited.
    fn issue_async(&self, args: &[String], input: Option<&str>) -> Result<Box<dyn BackendHandle>>;

    /// Whether the bound serial is currently in the reachable set
    fn is_reachable(&self) -> Result<bool>;
}

/// Host-side handle of an asynchronously started command
pub trait BackendHandle: Send {
    /// Whether the command is still running
    fn is_running(&mut self) -> Result<bool>;

    /// Halt the command if it is still running and reap it
    fn terminate(&mut self) -> Result<()>;

    /// Wait for the command to end and return its exit code, `None` when a
    /// signal ended it
    fn wait(&mut self) -> Result<Option<i32>>;
}
