//! Turning a serial selector into a connected device

use std::sync::Arc;

use tq_core::config::HostConfig;
use tq_core::error::Result;
use tq_core::{Clock, Serial, SystemClock, Verdict};
use tracing::debug;

use crate::device::AndroidDevice;
use crate::directory::EndpointDirectory;
use crate::prompt::Chooser;

/// Builds [`AndroidDevice`]s for serials the directory has verified
pub struct DeviceConnector {
    directory: EndpointDirectory,
    clock: Arc<dyn Clock>,
    config: HostConfig,
}

impl DeviceConnector {
    /// Create a connector with the system clock
    pub fn new(directory: EndpointDirectory, config: HostConfig) -> Self {
        Self::with_clock(directory, config, Arc::new(SystemClock))
    }

    /// Create a connector whose devices wait on `clock`
    pub fn with_clock(directory: EndpointDirectory, config: HostConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory,
            clock,
            config,
        }
    }

    /// The directory used to resolve serials
    pub fn directory(&self) -> &EndpointDirectory {
        &self.directory
    }

    /// Wrap `serial` without checking it
    fn attach(&self, serial: &Serial) -> AndroidDevice {
        AndroidDevice::new(
            self.directory.bridge().connect(serial),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    /// Resolve a device.
    ///
    /// An explicit `serial` must be connected. Without one the default is
    /// resolved; if that fails and `required` is false the result is
    /// `Ok(None)` instead of the error.
    pub fn get_device(
        &self,
        serial: Option<&Serial>,
        required: bool,
        chooser: &mut dyn Chooser,
        args_hint: &str,
    ) -> Result<Verdict<Option<AndroidDevice>>> {
        if let Some(serial) = serial {
            return Ok(self
                .directory
                .verify(serial)?
                .map(|()| Some(self.attach(serial))));
        }

        match self.directory.resolve_default(chooser, args_hint)? {
            Ok(serial) => {
                debug!(%serial, "Resolved default device");
                Ok(Ok(Some(self.attach(&serial))))
            }
            Err(e) if required => Ok(Err(e)),
            Err(e) => {
                debug!(error = %e, "No default device, continuing without one");
                Ok(Ok(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBridge, ScriptedChooser};

    fn connector(bridge: FakeBridge) -> DeviceConnector {
        DeviceConnector::new(EndpointDirectory::new(Arc::new(bridge)), HostConfig::default())
    }

    #[test]
    fn test_explicit_serial_verified() {
        let c = connector(FakeBridge::with_devices(&["a", "b"]));
        let mut chooser = ScriptedChooser::default();
        let device = c
            .get_device(Some(&Serial::new("b")), true, &mut chooser, "")
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(device.serial().as_str(), "b");
        assert!(chooser.prompts().is_empty());

        let err = c
            .get_device(Some(&Serial::new("z")), false, &mut chooser, "")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.message, "Device with serial z is not connected.");
    }

    #[test]
    fn test_default_not_required_yields_none() {
        let c = connector(FakeBridge::with_devices(&[]));
        let result = c
            .get_device(None, false, &mut ScriptedChooser::default(), "")
            .unwrap();
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_default_required_yields_error() {
        let c = connector(FakeBridge::with_devices(&[]));
        let err = c
            .get_device(None, true, &mut ScriptedChooser::default(), "")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.message, "There are currently no devices connected.");
    }
}
