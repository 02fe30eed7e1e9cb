//! Preflight check for the Linux capabilities the gateway needs:
//! - CAP_BPF: load the XDP object and create its maps (kernel >= 5.8)
//! - CAP_NET_ADMIN: attach XDP programs to interfaces
//! - CAP_SYS_ADMIN: stands in for CAP_BPF on older kernels
//! - CAP_SYS_RESOURCE: raise the memlock rlimit on kernels without memcg accounting
//!
//! The check only warns. The kernel rejects the load or attach anyway with a
//! precise errno, and root inside some containers reports a partial CapEff.

use std::fs;

use tracing::{debug, warn};

use crate::error::{GatewayError, Result};

/// Linux capability constants from <linux/capability.h>
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    NetAdmin = 12,
    SysAdmin = 21,
    SysResource = 24,
    Bpf = 39,
}

impl Capability {
    fn name(&self) -> &'static str {
        match self {
            Capability::NetAdmin => "CAP_NET_ADMIN",
            Capability::SysAdmin => "CAP_SYS_ADMIN",
            Capability::SysResource => "CAP_SYS_RESOURCE",
            Capability::Bpf => "CAP_BPF",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Capability::NetAdmin => "attach XDP programs to network interfaces",
            Capability::SysAdmin => "load eBPF programs on kernels older than 5.8",
            Capability::SysResource => "raise the memlock rlimit",
            Capability::Bpf => "load eBPF programs and maps",
        }
    }
}

const REQUIRED: [Capability; 4] = [
    Capability::Bpf,
    Capability::NetAdmin,
    Capability::SysAdmin,
    Capability::SysResource,
];

/// Extract the effective capability mask from the contents of
/// `/proc/<pid>/status`.
fn effective_mask(status: &str) -> Result<u64> {
    let caps_hex = status
        .lines()
        .find_map(|line| line.strip_prefix("CapEff:").map(str::trim))
        .ok_or_else(|| GatewayError::internal("CapEff line not found in process status"))?;

    u64::from_str_radix(caps_hex, 16).map_err(|e| {
        GatewayError::internal(format!("failed to parse capability mask '{caps_hex}': {e}"))
    })
}

fn missing_from(mask: u64) -> Vec<Capability> {
    let has = |cap: Capability| mask & (1u64 << (cap as u32)) != 0;

    REQUIRED
        .into_iter()
        .filter(|cap| !has(*cap))
        // CAP_SYS_ADMIN covers CAP_BPF and is not needed when CAP_BPF is present.
        .filter(|cap| match cap {
            Capability::Bpf => !has(Capability::SysAdmin),
            Capability::SysAdmin => !has(Capability::Bpf),
            _ => true,
        })
        .collect()
}

/// Log a warning for every required capability the process lacks.
pub fn check_required_capabilities() {
    let mask = match fs::read_to_string("/proc/self/status")
        .map_err(|e| GatewayError::internal(format!("failed to read /proc/self/status: {e}")))
        .and_then(|status| effective_mask(&status))
    {
        Ok(mask) => mask,
        Err(e) => {
            warn!(
                event.name = "capabilities.check_failed",
                error = %e,
                "failed to check capabilities, assuming present"
            );
            return;
        }
    };

    debug!(
        event.name = "capabilities.effective",
        mask = format!("0x{mask:016x}"),
        "read effective capability mask"
    );

    for cap in missing_from(mask) {
        warn!(
            event.name = "capabilities.missing",
            capability = cap.name(),
            description = cap.description(),
            "required capability is missing, startup will likely fail"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_STATUS: &str = "Name:\txdpgw\nCapInh:\t0000000000000000\nCapPrm:\t000001ffffffffff\nCapEff:\t000001ffffffffff\n";

    #[test]
    fn parses_effective_mask() {
        assert_eq!(effective_mask(ROOT_STATUS).unwrap(), 0x0000_01ff_ffff_ffff);
    }

    #[test]
    fn missing_cap_eff_line_is_an_error() {
        assert!(effective_mask("Name:\txdpgw\n").is_err());
        assert!(effective_mask("CapEff:\tzz\n").is_err());
    }

    #[test]
    fn root_has_everything() {
        assert!(missing_from(0x0000_01ff_ffff_ffff).is_empty());
    }

    #[test]
    fn unprivileged_lacks_everything() {
        assert_eq!(missing_from(0), REQUIRED.to_vec());
    }

    #[test]
    fn sys_admin_stands_in_for_bpf() {
        let mask = (1u64 << 21) | (1 << 12) | (1 << 24);
        assert!(missing_from(mask).is_empty());

        let mask = (1u64 << 39) | (1 << 12) | (1 << 24);
        assert!(missing_from(mask).is_empty());

        let mask = (1u64 << 39) | (1 << 21) | (1 << 24);
        assert_eq!(missing_from(mask), vec![Capability::NetAdmin]);
    }

    #[test]
    fn check_only_warns() {
        // Never fails startup, whatever the process holds.
        check_required_capabilities();
    }

    #[test]
    fn test_capability_names() {
        assert_eq!(Capability::NetAdmin.name(), "CAP_NET_ADMIN");
        assert_eq!(Capability::SysAdmin.name(), "CAP_SYS_ADMIN");
        assert_eq!(Capability::Bpf.name(), "CAP_BPF");
    }
}
