//! Groupcast participant.
//!
//! Two concurrent activities per participant process:
//!
//! ```text
//! stdin ─▶ UserCommand ─▶ Participant ──inbound──▶ coordinator
//!                              │
//!                              └─ DeliveryListener ◀──delivery── coordinator
//!                                        │
//!                                        ▼
//!                                 local append-only log
//! ```
//!
//! The relay owns the inbound connection; the listener is started before
//! every `register`/`reconnect` and cancelled by `deregister`/`disconnect`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod listener;
mod session;

pub use error::ClientError;
pub use listener::DeliveryListener;
pub use session::{Flow, Participant, UserCommand};
