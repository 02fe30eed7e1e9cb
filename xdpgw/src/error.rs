// Error types for the gateway control plane

use thiserror::Error;

use crate::{kernel::ProgramRole, runtime::conf::ConfError};

/// Boxed cause for errors raised by the kernel-facing layer. Keeping the
/// cause opaque lets test doubles fail the same calls the aya layer does.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Every failure the startup and shutdown sequence can report. The message of
/// each variant names the stage that failed.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfError),

    #[error("failed to load ebpf object '{object}': {source}")]
    Load {
        object: String,
        #[source]
        source: BoxError,
    },

    #[error("network interface '{name}' not found")]
    InterfaceNotFound { name: String },

    #[error("interface '{name}' has index {index}, which does not fit the 16-bit backend field")]
    InterfaceIndexOutOfRange { name: String, index: u32 },

    #[error("failed to attach {role} xdp program to interface index {ifindex}: {source}")]
    Attach {
        role: ProgramRole,
        ifindex: u32,
        #[source]
        source: BoxError,
    },

    #[error("failed to write backend entry to map '{map}': {source}")]
    TableWrite {
        map: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to read backend entry from map '{map}': {source}")]
    TableRead {
        map: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to detach {role} xdp program from interface index {ifindex}: {source}")]
    Detach {
        role: ProgramRole,
        ifindex: u32,
        #[source]
        source: BoxError,
    },

    #[error("failed to release ebpf object: {source}")]
    Close {
        #[source]
        source: BoxError,
    },

    #[error("failed to wait for termination signal: {0}")]
    Signal(#[source] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn load(object: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Load {
            object: object.into(),
            source: source.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
