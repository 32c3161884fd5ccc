//! Hand-off of a finished trace to whatever displays it

use std::path::Path;

use tq_core::error::Result;

/// Receives the last artifact of a session when the UI was requested
pub trait Viewer {
    fn open(&mut self, artifact: &Path, symbols: Option<&Path>) -> Result<()>;
}

/// Viewer that ignores every artifact
#[derive(Debug, Default)]
pub struct NoViewer;

impl Viewer for NoViewer {
    fn open(&mut self, _artifact: &Path, _symbols: Option<&Path>) -> Result<()> {
        Ok(())
    }
}
