//! adb-backed transport
//!
//! [`AdbBridge`] runs host-level adb commands (`adb devices`, existence
//! checks). [`AdbTransport`] binds the bridge to one serial and prefixes
//! `-s <serial>` to every command it issues.

mod process;

pub use process::ChildHandle;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tq_core::error::{Fault, Result};
use tq_core::{BackendHandle, CommandOutput, CommandRequest, ExitCode, Serial, Transport};
use tracing::debug;

use crate::directory::{parse_devices, DeviceBridge};

/// Host-side handle on the adb binary
#[derive(Debug, Clone)]
pub struct AdbBridge {
    program: PathBuf,
}

impl AdbBridge {
    /// Create a bridge for the adb binary at `program`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Path or name of the adb binary
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run an adb command that is not addressed to a device
    pub fn run_host(&self, request: &CommandRequest) -> Result<CommandOutput> {
        process::run(&self.program, &request.args, request)
    }
}

impl Default for AdbBridge {
    fn default() -> Self {
        Self::new("adb")
    }
}

impl DeviceBridge for AdbBridge {
    fn adb_exists(&self) -> Result<bool> {
        // Bare `adb` prints usage and exits 1; that still means it exists.
        let request = CommandRequest::new(Vec::<String>::new())
            .ignore(ExitCode::FAILURE)
            .ignore(ExitCode::NOT_FOUND)
            .capture();
        match self.run_host(&request) {
            Ok(output) => Ok(output.exit_code != ExitCode::NOT_FOUND),
            Err(Fault::Spawn { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                debug!("adb binary {:?} not found", self.program);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn list_devices(&self) -> Result<String> {
        let output = self.run_host(&CommandRequest::new(["devices"]).capture())?;
        Ok(output.stdout_str())
    }

    fn connect(&self, serial: &Serial) -> Arc<dyn Transport> {
        Arc::new(AdbTransport::new(self.clone(), serial.clone()))
    }
}

/// Transport bound to one serial
#[derive(Debug, Clone)]
pub struct AdbTransport {
    bridge: AdbBridge,
    serial: Serial,
}

impl AdbTransport {
    /// Bind `bridge` to `serial`
    pub fn new(bridge: AdbBridge, serial: Serial) -> Self {
        Self { bridge, serial }
    }

    fn addressed(&self, args: &[String]) -> Vec<String> {
        let mut full = vec!["-s".to_string(), self.serial.to_string()];
        full.extend(args.iter().cloned());
        full
    }
}

impl Transport for AdbTransport {
    fn id(&self) -> &Serial {
        &self.serial
    }

    fn issue(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let args = self.addressed(&request.args);
        process::run(self.bridge.program(), &args, request)
    }

    fn issue_async(&self, args: &[String], input: Option<&str>) -> Result<Box<dyn BackendHandle>> {
        let args = self.addressed(args);
        let handle = process::spawn(self.bridge.program(), &args, input)?;
        Ok(Box::new(handle))
    }

    fn is_reachable(&self) -> Result<bool> {
        let listing = self.bridge.list_devices()?;
        Ok(parse_devices(&listing).contains(&self.serial))
    }
}
