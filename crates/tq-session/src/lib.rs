//! tq-session: Trace session orchestration for torq
//!
//! This crate contains:
//! - The session descriptor and its flag validation
//! - The orchestrator that arms, triggers and collects traces over N runs
//! - Perfetto config rendering and artifact naming
//! - Multi-machine traced relay configuration

pub mod artifacts;
pub mod descriptor;
pub mod orchestrator;
pub mod outcome;
pub mod perfetto;
pub mod trigger;
pub mod viewer;
pub mod vm;

pub use descriptor::{Backend, EventKind, SessionDescriptor, TriggerMode, TriggerSpec};
pub use orchestrator::{Orchestrator, SessionState};
pub use outcome::{RunOutcome, SessionResult};
pub use trigger::send_triggers;
pub use viewer::{NoViewer, Viewer};
pub use vm::{MachineSpec, PrimaryAddress, RelayTopology};
