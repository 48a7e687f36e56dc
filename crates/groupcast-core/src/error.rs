//! Error taxonomy shared by the coordinator and the participant.

use std::path::PathBuf;

use thiserror::Error;

use crate::{handle::HandleState, registry::HandleId};

/// A command line that could not be interpreted.
///
/// Protocol errors never close the connection: the offending line is
/// reported and the next line is processed normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Blank line.
    #[error("empty command")]
    Empty,

    /// First token is not a known command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Wrong number of tokens for the command.
    #[error("{command} expects {expected} argument(s), got {actual}")]
    Arity {
        /// Command keyword.
        command: &'static str,
        /// Human readable expectation (e.g. "3" or "at least 1").
        expected: &'static str,
        /// Number of arguments received.
        actual: usize,
    },

    /// Port token is not a valid non-zero `u16`.
    #[error("invalid port: {0}")]
    InvalidPort(String),

    /// Command is well formed but not allowed in the handle's current state.
    #[error("{command} not allowed while {state}")]
    InvalidState {
        /// Command keyword.
        command: &'static str,
        /// State the handle was in.
        state: HandleState,
    },
}

/// Outbound delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The delivery channel's writer is gone (socket error or shutdown).
    #[error("delivery channel closed")]
    Closed,
}

/// Errors from shared group operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    /// Reconnect replay requested for a handle that is not registered.
    #[error("handle {0} is not an active member")]
    NotMember(HandleId),

    /// Replay could not be delivered; the handle has been deregistered.
    #[error("replay to handle {handle} failed: {source}")]
    Replay {
        /// Handle whose channel broke.
        handle: HandleId,
        /// Underlying delivery failure.
        source: DeliveryError,
    },
}

/// Startup configuration errors. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("cannot read config {path}: {source}")]
    Read {
        /// File that failed to open.
        path: PathBuf,
        /// IO failure.
        source: std::io::Error,
    },

    /// A required field is absent.
    #[error("missing {0}")]
    Missing(&'static str),

    /// Participant id is not a single whitespace-free token.
    #[error("invalid participant id {0:?}: must not contain whitespace")]
    InvalidIdentity(String),

    /// Port is not a valid non-zero `u16`.
    #[error("invalid port: {0:?}")]
    InvalidPort(String),

    /// Retention window is not a whole number of seconds.
    #[error("invalid retention window: {0:?}")]
    InvalidRetention(String),
}
