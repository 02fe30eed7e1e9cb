//! Conversions between human-readable addresses and the fixed-width forms
//! stored in the backend table.
//!
//! IPv4 addresses are kept with their octets in network order in memory,
//! which on the host reads as `u32::from_le_bytes(octets)`. The in-kernel
//! program compares them directly against header fields, so a byte-order
//! mistake here silently misroutes traffic instead of failing.

use std::net::{IpAddr, Ipv4Addr};

use thiserror::Error;

/// Number of octets in an Ethernet hardware address.
pub const MAC_LEN: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("'{0}' is not a valid IPv4 address")]
    InvalidAddress(String),

    #[error("'{0}' is not a valid hardware address, expected six colon-separated hex bytes")]
    InvalidHardwareAddress(String),
}

/// Parse a textual IPv4 address into the table encoding.
///
/// IPv4-mapped IPv6 (`::ffff:a.b.c.d`) is accepted and unwrapped.
pub fn encode_ipv4(text: &str) -> Result<u32, AddressError> {
    parse_ipv4(text).map(to_table_order)
}

fn parse_ipv4(text: &str) -> Result<Ipv4Addr, AddressError> {
    match text.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => Ok(addr),
        Ok(IpAddr::V6(addr)) => addr
            .to_ipv4_mapped()
            .ok_or_else(|| AddressError::InvalidAddress(text.to_string())),
        Err(_) => Err(AddressError::InvalidAddress(text.to_string())),
    }
}

fn to_table_order(addr: Ipv4Addr) -> u32 {
    u32::from_le_bytes(addr.octets())
}

/// Inverse of [`encode_ipv4`].
pub fn decode_ipv4(value: u32) -> Ipv4Addr {
    Ipv4Addr::from(value.to_le_bytes())
}

/// Parse `aa:bb:cc:dd:ee:ff` into six bytes.
///
/// Every group must be exactly two hex digits.
pub fn encode_mac(text: &str) -> Result<[u8; MAC_LEN], AddressError> {
    let invalid = || AddressError::InvalidHardwareAddress(text.to_string());

    let groups: Vec<&str> = text.trim().split(':').collect();
    if groups.len() != MAC_LEN {
        return Err(invalid());
    }

    let mut mac = [0u8; MAC_LEN];
    for (octet, group) in mac.iter_mut().zip(groups) {
        if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        *octet = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
    }

    Ok(mac)
}

pub fn format_mac(mac: &[u8; MAC_LEN]) -> String {
    mac.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}
