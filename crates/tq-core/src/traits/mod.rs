//! Core traits for torq
//!
//! These traits are the seams between the device facade and the subprocess
//! world, so the facade and the session orchestrator can be driven by a
//! scripted transport in tests.

mod transport;

pub use transport::{BackendHandle, Transport};
