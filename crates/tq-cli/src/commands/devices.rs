//! Devices command implementation

use anyhow::Result;
use tq_core::ValidationError;

use super::CommandContext;
use crate::output::{format_devices, print_validation_error, DeviceEntry};

/// List the devices adb can reach
pub fn devices_command(ctx: &CommandContext, json: bool) -> Result<()> {
    let directory = ctx.directory();
    if !directory.bridge().adb_exists()? {
        print_validation_error(&ValidationError::new(
            "adb could not be found on the host device.",
        ));
        return Ok(());
    }

    let serials = directory.list_reachable()?;
    let env_serial = std::env::var(&ctx.config.host.serial_env).ok();
    let devices = DeviceEntry::from_serials(&serials, env_serial.as_deref());

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else {
        println!("Connected Devices:");
        println!("{}", format_devices(&devices));
    }
    Ok(())
}
