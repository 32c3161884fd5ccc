//! Multi-machine tracing through traced relays
//!
//! One primary machine runs `traced` with a relay producer port; every
//! secondary runs `traced_relay` pointed at that port. The machines are
//! configured through system properties, with `persist.traced.enable` set
//! last so the daemons restart with the complete configuration.

use std::fmt;

use tq_core::error::Result;
use tq_core::{Serial, ValidationError, Verdict};
use tq_device::AndroidDevice;
use tracing::info;

pub const TRACED_MACHINE_NAME_PROP: &str = "traced.machine_name";
pub const TRACED_RELAY_PRODUCER_PORT_PROP: &str = "traced.relay_producer_port";
pub const TRACED_RELAY_PORT_PROP: &str = "traced_relay.relay_port";
pub const TRACED_ENABLE_PROP: &str = "persist.traced.enable";

/// Port the primary listens on unless told otherwise
pub const DEFAULT_RELAY_PORT: u16 = 30001;

/// Primary listen address for vsock
pub const DEFAULT_VSOCK_ADDR: &str = "vsock://-1:30001";

/// Primary listen address for TCP
pub const DEFAULT_IP_ADDR: &str = "0.0.0.0:30001";

const VSOCK_SCHEME: &str = "vsock://";

/// `[name=]serial` as given to `--primary` / `--secondary`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSpec {
    pub name: Option<String>,
    pub serial: Serial,
}

impl MachineSpec {
    /// Parse `[name=]serial`
    pub fn parse(arg: &str) -> Verdict<Self> {
        let invalid = || {
            ValidationError::new(format!(
                "Invalid format used in either --primary or --secondary argument: '{}'",
                arg
            ))
        };
        let parts: Vec<&str> = arg.split('=').collect();
        match parts.as_slice() {
            [serial] if !serial.is_empty() => Ok(Self {
                name: None,
                serial: Serial::new(*serial),
            }),
            [name, serial] if !name.is_empty() && !serial.is_empty() => Ok(Self {
                name: Some(name.to_string()),
                serial: Serial::new(*serial),
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for MachineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}={}", name, self.serial),
            None => write!(f, "{}", self.serial),
        }
    }
}

/// How secondaries reach the primary
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrimaryAddress {
    pub cid: Option<u32>,
    pub ip: Option<String>,
    /// `vsock://cid:port` or `ip:port`
    pub addr: Option<String>,
}

impl PrimaryAddress {
    /// Address the primary's traced listens on
    pub fn listen_addr(&self) -> String {
        if let Some(addr) = &self.addr {
            if let Some(rest) = addr.strip_prefix(VSOCK_SCHEME) {
                let port = rest.rsplit_once(':').map(|(_, p)| p).unwrap_or_default();
                return format!("{}-1:{}", VSOCK_SCHEME, port);
            }
            let port = addr.rsplit_once(':').map(|(_, p)| p).unwrap_or_default();
            return format!("0.0.0.0:{}", port);
        }
        if self.ip.is_some() {
            return DEFAULT_IP_ADDR.to_string();
        }
        DEFAULT_VSOCK_ADDR.to_string()
    }

    /// Address a secondary's traced_relay connects to
    pub fn target_addr(&self) -> Verdict<String> {
        if let Some(addr) = &self.addr {
            return Ok(addr.clone());
        }
        if let Some(cid) = self.cid {
            return Ok(format!("{}{}:{}", VSOCK_SCHEME, cid, DEFAULT_RELAY_PORT));
        }
        if let Some(ip) = &self.ip {
            return Ok(format!("{}:{}", ip, DEFAULT_RELAY_PORT));
        }
        Err(ValidationError::new(
            "Unable to resolve the network address of the primary machine",
        ))
    }
}

/// A complete `vm configure` request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelayTopology {
    pub primary: Option<MachineSpec>,
    pub secondaries: Vec<MachineSpec>,
    pub address: PrimaryAddress,
}

impl RelayTopology {
    /// Parse the raw `--primary` / `--secondary` arguments
    pub fn parse(
        primary: Option<&str>,
        secondaries: &[String],
        address: PrimaryAddress,
    ) -> Verdict<Self> {
        let primary = primary.map(MachineSpec::parse).transpose()?;
        let secondaries = secondaries
            .iter()
            .map(|s| MachineSpec::parse(s))
            .collect::<Verdict<Vec<_>>>()?;
        Ok(Self {
            primary,
            secondaries,
            address,
        })
    }

    /// Configure every machine. `connect` resolves a serial to a device.
    ///
    /// The secondary target address is checked before any property is set.
    pub fn apply<F>(&self, mut connect: F) -> Result<Verdict<()>>
    where
        F: FnMut(&Serial) -> Result<Verdict<AndroidDevice>>,
    {
        let target = if self.secondaries.is_empty() {
            None
        } else {
            match self.address.target_addr() {
                Ok(addr) => Some(addr),
                Err(e) => return Ok(Err(e)),
            }
        };

        if let Some(primary) = &self.primary {
            let device = match connect(&primary.serial)? {
                Ok(device) => device,
                Err(e) => return Ok(Err(e)),
            };
            let listen = self.address.listen_addr();
            info!(machine = %primary, listen = %listen, "Configuring primary");
            configure(&device, primary, TRACED_RELAY_PRODUCER_PORT_PROP, &listen, "1")?;
        }

        if let Some(target) = &target {
            for secondary in &self.secondaries {
                let device = match connect(&secondary.serial)? {
                    Ok(device) => device,
                    Err(e) => return Ok(Err(e)),
                };
                info!(machine = %secondary, target = %target, "Configuring secondary");
                configure(&device, secondary, TRACED_RELAY_PORT_PROP, target, "2")?;
            }
        }
        Ok(Ok(()))
    }
}

fn configure(
    device: &AndroidDevice,
    machine: &MachineSpec,
    port_prop: &str,
    port: &str,
    enable: &str,
) -> Result<()> {
    if let Some(name) = &machine.name {
        device.set_prop(TRACED_MACHINE_NAME_PROP, name)?;
    }
    device.set_prop(port_prop, port)?;
    device.set_prop(TRACED_ENABLE_PROP, enable)
}
