//! Standalone perfetto triggers

use tq_core::error::Result;
use tq_device::AndroidDevice;

/// Fire every trigger in `names`, in order, on a trace already running on `device`
pub fn send_triggers(device: &AndroidDevice, names: &[String]) -> Result<()> {
    for name in names {
        device.trigger_perfetto(name)?;
    }
    Ok(())
}
