//! Endpoint directory
//!
//! Lists the devices adb currently reports as ready and resolves a serial
//! selector (explicit, environment default, or interactive choice) to one
//! reachable device.

use std::sync::Arc;

use tq_core::error::Result;
use tq_core::{Serial, Transport, ValidationError, Verdict};
use tracing::{debug, warn};

use crate::prompt::Chooser;

/// Header line printed by `adb devices`
const LISTING_HEADER: &str = "List of devices attached";

/// Status adb reports for a ready device
const READY_STATUS: &str = "device";

/// Host-level access to the device bridge
pub trait DeviceBridge: Send + Sync {
    /// Whether the bridge binary is installed on the host
    fn adb_exists(&self) -> Result<bool>;

    /// Raw output of the device listing command
    fn list_devices(&self) -> Result<String>;

    /// Bind a transport to `serial`
    fn connect(&self, serial: &Serial) -> Arc<dyn Transport>;
}

/// Parse `adb devices` output into the ready serials, in reporting order
pub fn parse_devices(listing: &str) -> Vec<Serial> {
    let mut serials = Vec::new();
    for line in listing.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with(LISTING_HEADER) || line.starts_with('*') {
            continue;
        }
        let mut fields = line.split('\t');
        match (fields.next(), fields.next()) {
            (Some(serial), Some(status)) if !serial.is_empty() => {
                if status.trim() == READY_STATUS {
                    serials.push(Serial::new(serial));
                } else {
                    debug!(serial, status, "Skipping device that is not ready");
                }
            }
            _ => warn!(line, "Ignoring unrecognised device listing line"),
        }
    }
    serials
}

/// Numbered menu of reachable devices, built once and indexed directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMenu {
    entries: Vec<Serial>,
}

impl DeviceMenu {
    /// Build a menu from serials in reporting order
    pub fn new(entries: Vec<Serial>) -> Self {
        Self { entries }
    }

    /// Number of choices
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the menu has no choices
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Menu lines, one per device, suggesting the command to rerun with
    pub fn lines(&self, args_hint: &str) -> Vec<String> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, serial)| {
                let mut line = format!("{}: torq --serial {}", i, serial);
                if !args_hint.is_empty() {
                    line.push(' ');
                    line.push_str(args_hint);
                }
                line
            })
            .collect()
    }

    /// Prompt shown after the menu lines
    pub fn prompt(&self) -> String {
        format!("Select device[0-{}]: ", self.entries.len().saturating_sub(1))
    }

    /// Resolve a typed choice to a serial. Only plain digits are accepted.
    pub fn select(&self, input: &str) -> Verdict<Serial> {
        let choice = input.trim();
        Some(choice)
            .filter(|c| !c.is_empty() && c.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|c| c.parse::<usize>().ok())
            .and_then(|index| self.entries.get(index))
            .cloned()
            .ok_or_else(|| {
                ValidationError::with_suggestion(
                    format!("Invalid selection: '{}'.", choice),
                    "Please select a valid option.",
                )
            })
    }
}

/// Live view of the devices the bridge can reach
pub struct EndpointDirectory {
    bridge: Arc<dyn DeviceBridge>,
    env_name: String,
    env_serial: Option<String>,
}

impl EndpointDirectory {
    /// Create a directory without an environment default
    pub fn new(bridge: Arc<dyn DeviceBridge>) -> Self {
        Self {
            bridge,
            env_name: tq_core::config::DEFAULT_SERIAL_ENV.to_string(),
            env_serial: None,
        }
    }

    /// Create a directory whose default serial comes from `env_name`
    pub fn from_env(bridge: Arc<dyn DeviceBridge>, env_name: &str) -> Self {
        let env_serial = std::env::var(env_name).ok().filter(|s| !s.is_empty());
        Self::new(bridge).with_env_serial(env_name, env_serial)
    }

    /// Set the environment default explicitly
    pub fn with_env_serial(mut self, env_name: &str, serial: Option<String>) -> Self {
        self.env_name = env_name.to_string();
        self.env_serial = serial;
        self
    }

    /// The bridge this directory queries
    pub fn bridge(&self) -> &Arc<dyn DeviceBridge> {
        &self.bridge
    }

    /// Serials of ready devices, in the bridge's reporting order
    pub fn list_reachable(&self) -> Result<Vec<Serial>> {
        let listing = self.bridge.list_devices()?;
        Ok(parse_devices(&listing))
    }

    fn reachable_or_error(&self) -> Result<Verdict<Vec<Serial>>> {
        if !self.bridge.adb_exists()? {
            return Ok(Err(ValidationError::new(
                "adb could not be found on the host device.",
            )));
        }
        let serials = self.list_reachable()?;
        if serials.is_empty() {
            return Ok(Err(ValidationError::new(
                "There are currently no devices connected.",
            )));
        }
        Ok(Ok(serials))
    }

    /// Check that `serial` is currently reachable
    pub fn verify(&self, serial: &Serial) -> Result<Verdict<()>> {
        let serials = match self.reachable_or_error()? {
            Ok(serials) => serials,
            Err(e) => return Ok(Err(e)),
        };
        if !serials.contains(serial) {
            return Ok(Err(ValidationError::new(format!(
                "Device with serial {} is not connected.",
                serial
            ))));
        }
        Ok(Ok(()))
    }

    /// Pick the device to use when no serial was given.
    ///
    /// `args_hint` is appended to each menu line so the user can see the
    /// command to rerun with an explicit serial.
    pub fn resolve_default(
        &self,
        chooser: &mut dyn Chooser,
        args_hint: &str,
    ) -> Result<Verdict<Serial>> {
        let serials = match self.reachable_or_error()? {
            Ok(serials) => serials,
            Err(e) => return Ok(Err(e)),
        };

        if let Some(env_serial) = &self.env_serial {
            let serial = Serial::new(env_serial.clone());
            if serials.contains(&serial) {
                debug!(%serial, env = %self.env_name, "Using serial from environment");
                return Ok(Ok(serial));
            }
            return Ok(Err(ValidationError::new(format!(
                "Device with serial {} is set as environment variable, {}, but is not connected.",
                serial, self.env_name
            ))));
        }

        if let [only] = serials.as_slice() {
            return Ok(Ok(only.clone()));
        }

        let menu = DeviceMenu::new(serials);
        let mut text = String::from("There is more than one device currently connected.\n");
        for line in menu.lines(args_hint) {
            text.push_str(&line);
            text.push('\n');
        }
        text.push_str(&menu.prompt());
        let answer = chooser.ask(&text)?;
        let selected = menu.select(&answer);
        if let Ok(serial) = &selected {
            chooser.announce(&format!("Using device with serial {}.", serial));
        }
        Ok(selected)
    }
}
