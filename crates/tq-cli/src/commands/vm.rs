//! Virtual machine relay configuration

use anyhow::Result;
use clap::Args;
use tq_core::ValidationError;
use tq_device::StdinChooser;
use tq_session::{PrimaryAddress, RelayTopology};

use super::CommandContext;
use crate::output::{print_success, print_validation_error};

/// Flags of `torq vm configure`
#[derive(Args, Debug, Clone)]
pub struct VmConfigureArgs {
    /// Machine running traced, as [name=]serial
    #[arg(long)]
    pub primary: Option<String>,

    /// Machine running traced_relay, as [name=]serial (repeatable)
    #[arg(long)]
    pub secondary: Vec<String>,

    /// vsock CID of the primary machine
    #[arg(long)]
    pub primary_cid: Option<u32>,

    /// IP address of the primary machine
    #[arg(long, conflicts_with = "primary_cid")]
    pub primary_ip: Option<String>,

    /// Full address of the primary, vsock://cid:port or ip:port
    #[arg(long, conflicts_with_all = ["primary_cid", "primary_ip"])]
    pub primary_addr: Option<String>,
}

/// Set the traced properties on every machine
pub fn vm_configure_command(ctx: &CommandContext, args: &VmConfigureArgs) -> Result<()> {
    if args.primary.is_none() && args.secondary.is_empty() {
        print_validation_error(&ValidationError::with_suggestion(
            "Command is invalid because neither --primary nor --secondary is passed.",
            "Set --primary <serial> and/or --secondary <serial> to configure machines.",
        ));
        return Ok(());
    }

    let address = PrimaryAddress {
        cid: args.primary_cid,
        ip: args.primary_ip.clone(),
        addr: args.primary_addr.clone(),
    };
    let topology = match RelayTopology::parse(args.primary.as_deref(), &args.secondary, address) {
        Ok(topology) => topology,
        Err(e) => {
            print_validation_error(&e);
            return Ok(());
        }
    };

    let connector = ctx.connector();
    let mut chooser = StdinChooser;
    let applied = topology.apply(|serial| {
        let device = connector.get_device(Some(serial), true, &mut chooser, &ctx.args_hint)?;
        Ok(device.and_then(|device| {
            device.ok_or_else(|| {
                ValidationError::new(format!("Device with serial {} is not connected.", serial))
            })
        }))
    })?;
    if let Err(e) = applied {
        print_validation_error(&e);
        return Ok(());
    }

    let machines = topology.secondaries.len() + usize::from(topology.primary.is_some());
    print_success(&format!("Configured {} machine(s) for multi-machine tracing", machines));
    Ok(())
}
