//! Everything that talks to the kernel: loading the XDP object, attaching its
//! programs to interfaces, and writing the backend table.
//!
//! The orchestrator only sees the traits in [`dataplane`], so the aya-backed
//! types here can be swapped for an in-memory double in tests.

pub mod dataplane;
pub mod ebpf;
pub mod iface;
pub mod table;

pub use dataplane::{AttachedLink, Dataplane, InterfaceResolver, ProgramLoader, ProgramRole};
pub use ebpf::KernelLoader;
pub use iface::SystemInterfaces;
pub use table::UpdateMode;
