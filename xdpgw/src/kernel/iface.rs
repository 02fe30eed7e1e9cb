use pnet::datalink::{self, NetworkInterface};
use tracing::{debug, warn};

use crate::{
    error::{GatewayError, Result},
    kernel::dataplane::InterfaceResolver,
};

/// Resolves names against the interfaces visible in the current network
/// namespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceResolver for SystemInterfaces {
    fn resolve(&self, name: &str) -> Result<u32> {
        find_index(&datalink::interfaces(), name)
    }
}

fn find_index(interfaces: &[NetworkInterface], name: &str) -> Result<u32> {
    let iface = interfaces
        .iter()
        .find(|i| i.name == name)
        .ok_or_else(|| GatewayError::InterfaceNotFound {
            name: name.to_string(),
        })?;

    if !iface.is_up() {
        // XDP attaches to a down link fine; nothing flows until it comes up.
        warn!(
            event.name = "interface.down",
            network.interface.name = %name,
            network.interface.index = iface.index,
            "interface is administratively down"
        );
    }

    debug!(
        event.name = "interface.resolved",
        network.interface.name = %name,
        network.interface.index = iface.index,
        "resolved interface index"
    );

    Ok(iface.index)
}
