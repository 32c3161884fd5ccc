//! Trigger command implementation

use anyhow::Result;
use tq_core::ValidationError;
use tq_session::{send_triggers, Backend};

use super::CommandContext;
use crate::output::{print_success, print_validation_error};

/// Send `names` to the perfetto trace already running on the device
pub fn trigger_command(ctx: &CommandContext, names: &[String]) -> Result<()> {
    let device = match ctx.device()? {
        Ok(device) => device,
        Err(e) => {
            print_validation_error(&e);
            return Ok(());
        }
    };

    let running = match device.is_process_running(Backend::Perfetto.process_name())? {
        Ok(running) => running,
        Err(e) => {
            print_validation_error(&e);
            return Ok(());
        }
    };
    if !running {
        print_validation_error(&ValidationError::with_suggestion(
            format!(
                "No perfetto trace is running on device with serial {}.",
                device.serial()
            ),
            "Start a trace with torq --trigger-names <name> before sending triggers.",
        ));
        return Ok(());
    }

    send_triggers(&device, names)?;
    print_success(&format!(
        "Sent {} trigger(s) to device with serial {}",
        names.len(),
        device.serial()
    ));
    Ok(())
}
