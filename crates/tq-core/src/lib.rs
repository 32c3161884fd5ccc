//! tq-core: Core abstractions and configuration for torq
//!
//! This crate provides the error model, the transport and clock seams, the
//! polling primitive, and host configuration shared by the device layer,
//! the session orchestrator and the CLI.

pub mod config;
pub mod error;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{Fault, ValidationError, Verdict};
pub use time::{poll_until, Clock, ManualClock, SystemClock, POLLING_INTERVAL};
pub use traits::{BackendHandle, Transport};
pub use types::{CommandOutput, CommandRequest, ExitCode, Serial};
