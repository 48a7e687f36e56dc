//! Participant error types.

use groupcast_core::{ConfigError, ProtocolError};
use thiserror::Error;

/// Errors from participant operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket or log file failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Startup configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// User input is not a valid participant command.
    #[error("invalid command: {0}")]
    Protocol(#[from] ProtocolError),

    /// The coordinator answered a join with an error line.
    #[error("{command} rejected: {reason}")]
    Rejected {
        /// Command that was rejected.
        command: &'static str,
        /// Reason reported by the coordinator.
        reason: String,
    },

    /// The command connection closed while a reply was outstanding.
    #[error("coordinator closed the connection before acknowledging {command}")]
    NoAck {
        /// Command awaiting acknowledgement.
        command: &'static str,
    },
}

impl ClientError {
    /// Returns true if the command connection is unusable after this error.
    ///
    /// Rejections and bad input leave the session intact; the user may retry.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::NoAck { .. } | Self::Config(_) => true,
            Self::Rejected { .. } | Self::Protocol(_) => false,
            Self::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::AddrInUse | std::io::ErrorKind::PermissionDenied
            ),
        }
    }
}
