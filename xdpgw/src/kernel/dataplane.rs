use std::fmt;

use xdpgw_common::Backend;

use crate::{error::Result, kernel::table::UpdateMode};

/// Which side of the gateway a program is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramRole {
    /// Physical interface receiving the traffic to redirect.
    Source,
    /// Bridge interface the traffic is redirected to.
    Destination,
}

impl fmt::Display for ProgramRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramRole::Source => write!(f, "source"),
            ProgramRole::Destination => write!(f, "destination"),
        }
    }
}

/// Maps an interface name to its kernel index.
pub trait InterfaceResolver {
    fn resolve(&self, name: &str) -> Result<u32>;
}

/// Loads the kernel object and verifies both programs.
pub trait ProgramLoader {
    type Dataplane: Dataplane;

    fn load(&self) -> Result<Self::Dataplane>;
}

/// A loaded kernel object. Owns every program and map it contains until
/// [`Dataplane::close`] is called.
pub trait Dataplane {
    type Link: AttachedLink;

    /// Attach the program for `role` to the interface. The returned link owns
    /// the attachment.
    fn attach(&mut self, role: ProgramRole, ifindex: u32) -> Result<Self::Link>;

    fn publish_backend(&mut self, key: u32, backend: Backend, mode: UpdateMode) -> Result<()>;

    fn close(self) -> Result<()>;
}

/// One program attached to one interface.
pub trait AttachedLink {
    fn role(&self) -> ProgramRole;

    fn ifindex(&self) -> u32;

    fn detach(self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::ProgramRole;

    #[test]
    fn role_display_matches_log_and_error_wording() {
        assert_eq!(ProgramRole::Source.to_string(), "source");
        assert_eq!(ProgramRole::Destination.to_string(), "destination");
    }
}
