//! Results of a session

use serde::Serialize;
use std::path::PathBuf;

use crate::descriptor::{Backend, EventKind};

/// One arm/trigger/collect cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    /// 1-based run number
    pub run: u32,
    /// Host paths of the artifacts pulled during this run
    pub artifacts: Vec<PathBuf>,
    pub elapsed_ms: u64,
    /// False when an expected artifact could not be pulled
    pub success: bool,
}

/// Every run of a finished session, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionResult {
    pub serial: String,
    pub event: EventKind,
    pub backend: Backend,
    pub runs: Vec<RunOutcome>,
}

impl SessionResult {
    /// All artifacts of all runs
    pub fn artifacts(&self) -> impl Iterator<Item = &PathBuf> {
        self.runs.iter().flat_map(|r| r.artifacts.iter())
    }

    /// Whether every run pulled all of its artifacts
    pub fn succeeded(&self) -> bool {
        self.runs.iter().all(|r| r.success)
    }
}
