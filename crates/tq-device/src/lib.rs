//! tq-device: Android device access for torq
//!
//! This crate contains:
//! - The adb-backed [`Transport`](tq_core::Transport) implementation
//! - The endpoint directory and interactive device selection
//! - The [`AndroidDevice`] facade
//! - simpleperf event list parsing

pub mod adb;
pub mod connector;
pub mod device;
pub mod directory;
pub mod prompt;
pub mod simpleperf;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use adb::{AdbBridge, AdbTransport};
pub use connector::DeviceConnector;
pub use device::{
    AndroidDevice, UserId, BOOT_TRACE_PROP, PERFETTO_BOOT_CONFIG_FILE, PERFETTO_BOOT_TRACE_FILE,
    PERFETTO_TRACE_FILE,
};
pub use directory::{parse_devices, DeviceBridge, DeviceMenu, EndpointDirectory};
pub use prompt::{Chooser, StdinChooser};
pub use simpleperf::{DEFAULT_SIMPLEPERF_EVENT, SIMPLEPERF_TRACE_FILE};
