//! Deterministic simulation harness for groupcast.
//!
//! Turmoil-based implementations of the `Environment` and `Connector` seams,
//! so the production `ProtocolHandler` runs unchanged on a simulated network
//! with a virtual clock. Retention windows of several seconds elapse
//! instantly and every run is reproducible from its seed.
//!
//! # Example
//!
//! ```rust,ignore
//! use groupcast_core::RetentionWindow;
//! use groupcast_harness::{SimParticipant, serve_coordinator};
//!
//! let mut sim = turmoil::Builder::new().build();
//! sim.host("coordinator", || serve_coordinator(5000, RetentionWindow::from_secs(5)));
//! sim.client("alice", async {
//!     let mut alice = SimParticipant::connect("alice", "coordinator:5000").await?;
//!     alice.register(7000).await?;
//!     alice.msend("hello").await?;
//!     Ok(())
//! });
//! sim.run().unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod sim_connector;
mod sim_coordinator;
mod sim_env;
mod sim_participant;

pub use groupcast_core::env::{ManualEnv, ManualInstant};
pub use sim_connector::SimConnector;
pub use sim_coordinator::serve_coordinator;
pub use sim_env::SimEnv;
pub use sim_participant::SimParticipant;
