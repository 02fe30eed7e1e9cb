use std::fmt;

use tracing::info;

/// Lifecycle of one gateway run. Startup walks the states in declaration
/// order; any failure after `Validating` unwinds whatever was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GatewayState {
    Validating,
    LoadingProgram,
    AttachingSource,
    AttachingDestination,
    PublishingBackend,
    Running,
    ShuttingDown,
    Terminated,
}

impl GatewayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayState::Validating => "validating",
            GatewayState::LoadingProgram => "loading_program",
            GatewayState::AttachingSource => "attaching_source",
            GatewayState::AttachingDestination => "attaching_destination",
            GatewayState::PublishingBackend => "publishing_backend",
            GatewayState::Running => "running",
            GatewayState::ShuttingDown => "shutting_down",
            GatewayState::Terminated => "terminated",
        }
    }

    /// Log the move to `next` and return it.
    pub(crate) fn advance(self, next: GatewayState) -> GatewayState {
        info!(
            event.name = "gateway.state_changed",
            gateway.state.from = self.as_str(),
            gateway.state.to = next.as_str(),
            "gateway state changed"
        );
        next
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
