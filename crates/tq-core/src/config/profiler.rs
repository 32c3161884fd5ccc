//! Defaults applied to profiler sessions when flags are omitted

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default event duration in milliseconds
pub const DEFAULT_DUR_MS: u64 = 10_000;

/// Shortest accepted event duration or inter-run delay in milliseconds
pub const MIN_DURATION_MS: u64 = 3_000;

/// Default host output directory
pub const DEFAULT_OUT_DIR: &str = ".";

/// Profiler defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerDefaults {
    /// Event duration when `--dur-ms` is omitted
    pub dur_ms: u64,

    /// Delay between runs when `--between-dur-ms` is omitted
    pub between_dur_ms: u64,

    /// Output directory when `--out-dir` is omitted
    pub out_dir: PathBuf,
}

impl Default for ProfilerDefaults {
    fn default() -> Self {
        Self {
            dur_ms: DEFAULT_DUR_MS,
            between_dur_ms: DEFAULT_DUR_MS,
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
        }
    }
}
