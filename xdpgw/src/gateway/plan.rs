use xdpgw_common::Backend;

use crate::{
    addr::{self, MAC_LEN},
    runtime::conf::{Conf, ConfError},
};

/// Validated gateway parameters, parsed out of the layered configuration.
/// Addresses are already in table encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPlan {
    pub source_interface: String,
    pub source_address: u32,
    pub destination_interface: String,
    pub bridge_address: u32,
    pub container_address: u32,
    pub container_mac: [u8; MAC_LEN],
}

impl GatewayPlan {
    /// Every parameter is mandatory. All missing ones are reported together,
    /// by flag name, before any of the present ones is parsed.
    pub fn from_conf(conf: &Conf) -> Result<Self, ConfError> {
        let params: [(&'static str, Option<&str>); 6] = [
            ("sif", conf.source_interface.as_deref()),
            ("sip", conf.source_address.as_deref()),
            ("dif", conf.destination_interface.as_deref()),
            ("bip", conf.bridge_address.as_deref()),
            ("cip", conf.container_address.as_deref()),
            ("cmac", conf.container_mac.as_deref()),
        ];

        let missing: Vec<&'static str> = params
            .iter()
            .filter(|(_, value)| value.is_none_or(|v| v.trim().is_empty()))
            .map(|(flag, _)| *flag)
            .collect();
        if !missing.is_empty() {
            return Err(ConfError::MissingParameters(missing));
        }

        let [sif, sip, dif, bip, cip, cmac] = params.map(|(_, value)| value.unwrap_or_default());

        let ipv4 = |parameter: &'static str, text: &str| {
            addr::encode_ipv4(text).map_err(|source| ConfError::InvalidParameter { parameter, source })
        };

        Ok(Self {
            source_interface: sif.trim().to_string(),
            source_address: ipv4("sip", sip)?,
            destination_interface: dif.trim().to_string(),
            bridge_address: ipv4("bip", bip)?,
            container_address: ipv4("cip", cip)?,
            container_mac: addr::encode_mac(cmac).map_err(|source| {
                ConfError::InvalidParameter {
                    parameter: "cmac",
                    source,
                }
            })?,
        })
    }

    /// Table key: the address traffic arrives for on the source interface.
    pub fn key(&self) -> u32 {
        self.source_address
    }

    pub fn backend(&self, destination_ifindex: u16) -> Backend {
        Backend {
            saddr: self.bridge_address,
            daddr: self.container_address,
            hwaddr: self.container_mac,
            ifindex: destination_ifindex,
        }
    }
}
