//! Groupcast core logic.
//!
//! Everything in this crate is Sans-IO: the shared group state, the message
//! log, the wire command codec and the per-connection state machine are plain
//! data structures driven by a runtime (`groupcast-server` in production,
//! `groupcast-harness` under simulation).
//!
//! ## Architecture
//!
//! ```text
//! inbound line ─▶ Command::parse ─▶ ParticipantHandle::plan
//!                                          │
//!                                          ▼
//!                                   Group (one lock)
//!                         ┌────────────────┼─────────────────┐
//!                         ▼                ▼                 ▼
//!                  GroupRegistry      MessageLog        Fanout (outside
//!                  (ACTIVE set)       (time ordered)     the lock)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod group;
pub mod handle;
pub mod log;
pub mod message;
pub mod outbound;
pub mod registry;

pub use command::{Command, Endpoint};
pub use config::{CoordinatorConfig, ParticipantConfig};
pub use env::{Environment, ManualEnv, ManualInstant};
pub use error::{ConfigError, DeliveryError, GroupError, ProtocolError};
pub use group::{Fanout, FanoutReport, Group, ReplayReport};
pub use handle::{HandleState, ParticipantHandle, Transition};
pub use log::{LogEntry, MessageLog, RetentionWindow, ScanOutcome};
pub use message::format_message;
pub use outbound::Outbound;
pub use registry::{GroupRegistry, HandleId};
