//! Per-connection participant state machine.
//!
//! ## Transitions
//!
//! | From         | Command    | To           |
//! |--------------|------------|--------------|
//! | Unregistered | register   | Active       |
//! | Active       | deregister | Unregistered |
//! | Active       | disconnect | Disconnected |
//! | Disconnected | reconnect  | Active       |
//! | Active       | msend      | Active       |
//!
//! Everything else is rejected with `ProtocolError::InvalidState` and leaves
//! the state untouched. `plan` only decides; the runtime applies the
//! transition with `activate`/`leave` once the side effects (opening the
//! delivery channel, updating the group) have succeeded, so a failed join
//! never leaves the handle `Active`.

use std::fmt;

use crate::{
    command::{Command, Endpoint},
    error::ProtocolError,
    registry::HandleId,
};

/// Registration state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandleState {
    /// Connected but not a member. Initial state.
    #[default]
    Unregistered,
    /// Member of the multicast group.
    Active,
    /// Temporarily offline; may reconnect and replay the window.
    Disconnected,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unregistered => "unregistered",
            Self::Active => "active",
            Self::Disconnected => "disconnected",
        })
    }
}

/// What the runtime must do to carry out an accepted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Open a delivery channel to `endpoint` and join the group.
    Join {
        /// Identity announced by the participant.
        identity: String,
        /// Delivery endpoint.
        endpoint: Endpoint,
        /// Replay the retention window after joining (reconnect).
        replay: bool,
    },
    /// Leave the group and move to `next`.
    Leave {
        /// Unregistered (deregister) or Disconnected (disconnect).
        next: HandleState,
    },
    /// Multicast the space-joined words.
    Send {
        /// Message words.
        words: Vec<String>,
    },
}

/// Identity and state of one accepted connection.
///
/// The delivery channel itself lives with the runtime, which owns the
/// network types.
#[derive(Debug, Clone)]
pub struct ParticipantHandle {
    id: HandleId,
    identity: Option<String>,
    state: HandleState,
}

impl ParticipantHandle {
    /// Fresh handle for a newly accepted connection.
    pub fn new(id: HandleId) -> Self {
        Self { id, identity: None, state: HandleState::Unregistered }
    }

    /// Connection id.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Participant id announced on the last successful join.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Current state.
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Decide what `command` means in the current state.
    pub fn plan(&self, command: Command) -> Result<Transition, ProtocolError> {
        let keyword = command.keyword();
        match (self.state, command) {
            (HandleState::Unregistered, Command::Register { identity, endpoint }) => {
                Ok(Transition::Join { identity, endpoint, replay: false })
            },
            (HandleState::Disconnected, Command::Reconnect { identity, endpoint }) => {
                Ok(Transition::Join { identity, endpoint, replay: true })
            },
            (HandleState::Active, Command::Deregister) => {
                Ok(Transition::Leave { next: HandleState::Unregistered })
            },
            (HandleState::Active, Command::Disconnect) => {
                Ok(Transition::Leave { next: HandleState::Disconnected })
            },
            (HandleState::Active, Command::Msend { words }) => Ok(Transition::Send { words }),
            (state, _) => Err(ProtocolError::InvalidState { command: keyword, state }),
        }
    }

    /// Record a successful join.
    pub fn activate(&mut self, identity: String) {
        self.identity = Some(identity);
        self.state = HandleState::Active;
    }

    /// Record leaving the group.
    ///
    /// Deregistering forgets the identity; a later register is a fresh
    /// entrant.
    pub fn leave(&mut self, next: HandleState) {
        debug_assert_ne!(next, HandleState::Active);
        if next == HandleState::Unregistered {
            self.identity = None;
        }
        self.state = next;
    }

    /// Reconcile with the registry after the handle may have been evicted.
    ///
    /// An `Active` handle that is no longer a member lost its delivery channel
    /// and is treated as disconnected. Returns `true` if the state changed.
    pub fn reconcile(&mut self, is_member: bool) -> bool {
        if self.state == HandleState::Active && !is_member {
            self.state = HandleState::Disconnected;
            return true;
        }
        false
    }
}
