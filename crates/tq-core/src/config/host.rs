//! Host-side configuration: where adb lives and how long device waits may take

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::{duration_millis, duration_secs};
use crate::time::POLLING_INTERVAL;

/// Environment variable consulted for the default serial
pub const DEFAULT_SERIAL_ENV: &str = "ANDROID_SERIAL";

/// Configuration for talking to devices through adb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Path or name of the adb binary
    pub adb_path: PathBuf,

    /// Environment variable holding the default serial
    pub serial_env: String,

    /// Interval between polls of device state
    #[serde(rename = "poll_interval_ms", with = "duration_millis")]
    pub poll_interval: Duration,

    /// How long a rooted device may take to reconnect
    #[serde(rename = "root_timeout_secs", with = "duration_secs")]
    pub root_timeout: Duration,

    /// How long a device may take to drop off after `adb reboot`
    #[serde(rename = "reboot_timeout_secs", with = "duration_secs")]
    pub reboot_timeout: Duration,

    /// How long `sys.boot_completed` may take to become 1
    #[serde(rename = "boot_timeout_secs", with = "duration_secs")]
    pub boot_timeout: Duration,

    /// How long a rebooting device may take to reattach
    #[serde(rename = "wait_for_device_timeout_secs", with = "duration_secs")]
    pub wait_for_device_timeout: Duration,

    /// How long a user switch may take to be reported as current
    #[serde(rename = "user_switch_timeout_secs", with = "duration_secs")]
    pub user_switch_timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            adb_path: PathBuf::from("adb"),
            serial_env: DEFAULT_SERIAL_ENV.to_string(),
            poll_interval: POLLING_INTERVAL,
            root_timeout: Duration::from_secs(5),
            reboot_timeout: Duration::from_secs(5),
            boot_timeout: Duration::from_secs(30),
            wait_for_device_timeout: Duration::from_secs(5),
            user_switch_timeout: Duration::from_secs(15),
        }
    }
}
