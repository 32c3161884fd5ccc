//! Where trace files live on the device and where they land on the host

use std::path::{Path, PathBuf};

use tq_device::{PERFETTO_BOOT_TRACE_FILE, PERFETTO_TRACE_FILE, SIMPLEPERF_TRACE_FILE};

use crate::descriptor::{Backend, EventKind};

/// Device path the backend writes to
pub fn device_trace_path(backend: Backend, event: EventKind) -> &'static str {
    match (backend, event) {
        (Backend::Simpleperf, _) => SIMPLEPERF_TRACE_FILE,
        (Backend::Perfetto, EventKind::Boot) => PERFETTO_BOOT_TRACE_FILE,
        (Backend::Perfetto, _) => PERFETTO_TRACE_FILE,
    }
}

/// Device path of the `index`th clone snapshot
pub fn clone_path(base: &str, index: usize) -> String {
    format!("{}.{}", base, index)
}

/// Directory simpleperf writes into, which must exist before recording
pub fn device_trace_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("/")
}

/// Names host files for one session
#[derive(Debug, Clone)]
pub struct ArtifactNamer {
    out_dir: PathBuf,
    stem: String,
    extension: &'static str,
    runs: u32,
}

impl ArtifactNamer {
    /// `started_ms` keeps files of different sessions apart
    pub fn new(out_dir: &Path, backend: Backend, event: EventKind, runs: u32, started_ms: u64) -> Self {
        let (prefix, extension) = match backend {
            Backend::Perfetto => ("trace", "perfetto-trace"),
            Backend::Simpleperf => ("perf", "data"),
        };
        Self {
            out_dir: out_dir.to_path_buf(),
            stem: format!("{}-{}-{}", prefix, event, started_ms),
            extension,
            runs,
        }
    }

    fn stem_for_run(&self, run: u32) -> String {
        if self.runs > 1 {
            format!("{}-run{}", self.stem, run)
        } else {
            self.stem.clone()
        }
    }

    /// Host path for run `run` (1-based)
    pub fn run_path(&self, run: u32) -> PathBuf {
        self.out_dir
            .join(format!("{}.{}", self.stem_for_run(run), self.extension))
    }

    /// Host path for clone snapshot `index` taken during run `run`
    pub fn clone_path(&self, run: u32, index: usize) -> PathBuf {
        self.out_dir.join(format!(
            "{}.{}.{}",
            self.stem_for_run(run),
            index,
            self.extension
        ))
    }
}
