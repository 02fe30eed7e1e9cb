#![no_std]

/// Name of the XDP program attached to the source (physical) interface.
pub const SOURCE_PROGRAM: &str = "xdp_prog_func";

/// Name of the XDP program attached to the destination (bridge) interface.
///
/// The kernel only delivers `XDP_REDIRECT`ed frames to a device that has an
/// XDP program of its own, so this one exists purely to be attached.
pub const DESTINATION_PROGRAM: &str = "bpf_redirect_placeholder";

/// Name of the hash map the source program consults on every packet.
pub const BACKENDS_MAP: &str = "backends";

/// Rewrite target for packets addressed to one gateway address.
///
/// The layout is read field by field by the in-kernel program, so it must not
/// change without rebuilding that object. Addresses hold the four octets in
/// network order, i.e. `u32::from_le_bytes(octets)` on the host.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Backend {
    /// Address used as the new source (the bridge/gateway address).
    pub saddr: u32,
    /// Address used as the new destination (the container address).
    pub daddr: u32,
    /// Hardware address of the container.
    pub hwaddr: [u8; 6],
    /// Index of the bridge-side interface frames are redirected to.
    pub ifindex: u16,
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for Backend {}

const _: [(); 16] = [(); core::mem::size_of::<Backend>()];
