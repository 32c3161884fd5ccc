//! CLI command implementations

mod config;
mod devices;
mod profiler;
mod trigger;
mod vm;

use std::sync::Arc;

use tq_core::config::ConfigFile;
use tq_core::error::Result;
use tq_core::{Serial, ValidationError, Verdict};
use tq_device::{AdbBridge, AndroidDevice, DeviceConnector, EndpointDirectory, StdinChooser};

pub use config::{config_get, config_init, config_path, config_set, config_show};
pub use devices::devices_command;
pub use profiler::{profiler_command, ProfilerArgs};
pub use trigger::trigger_command;
pub use vm::{vm_configure_command, VmConfigureArgs};

/// Everything a device-facing command needs from the command line
pub struct CommandContext {
    pub config: ConfigFile,
    /// `--serial`, if given
    pub serial: Option<Serial>,
    /// The user's arguments, echoed in the device selection menu
    pub args_hint: String,
}

impl CommandContext {
    pub fn new(config: ConfigFile, serial: Option<String>, args_hint: String) -> Self {
        Self {
            config,
            serial: serial.map(Serial::new),
            args_hint,
        }
    }

    /// Directory over the configured adb binary
    pub fn directory(&self) -> EndpointDirectory {
        let bridge = AdbBridge::new(self.config.host.adb_path.clone());
        EndpointDirectory::from_env(Arc::new(bridge), &self.config.host.serial_env)
    }

    pub fn connector(&self) -> DeviceConnector {
        DeviceConnector::new(self.directory(), self.config.host.clone())
    }

    /// The `--serial` device, or the default one, asking on stdin if needed
    pub fn device(&self) -> Result<Verdict<AndroidDevice>> {
        let mut chooser = StdinChooser;
        let device = self.connector().get_device(
            self.serial.as_ref(),
            true,
            &mut chooser,
            &self.args_hint,
        )?;
        Ok(device.and_then(|device| {
            device.ok_or_else(|| ValidationError::new("There are currently no devices connected."))
        }))
    }
}
