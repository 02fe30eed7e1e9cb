//! Startup and shutdown sequencing for one gateway run.

mod orchestrator;
mod plan;
mod session;
mod state;
#[cfg(test)]
mod testing;

pub use orchestrator::Orchestrator;
pub use session::{GatewaySession, ShutdownReport};
