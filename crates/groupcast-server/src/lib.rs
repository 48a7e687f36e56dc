//! Groupcast coordinator.
//!
//! This crate provides the production coordinator using:
//! - Tokio for async runtime and TCP transport
//! - System time for retention and message tags
//!
//! ## Architecture
//!
//! ```text
//! groupcast-server
//!   ├─ Coordinator        (accept loop, one task per connection)
//!   ├─ ProtocolHandler    (per-connection state machine driver)
//!   ├─ DeliveryChannel    (writer task per ACTIVE participant)
//!   ├─ SystemEnv          (production Environment impl)
//!   └─ Group              (registry + log, from groupcast-core)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod delivery;
mod error;
mod handler;
mod settings;
mod system_env;

use std::{net::SocketAddr, sync::Arc};

pub use delivery::{Connector, DeliveryChannel, TcpConnector};
pub use error::ServerError;
use groupcast_core::{CoordinatorConfig, Environment, Group, HandleId, RetentionWindow};
pub use handler::{ProtocolHandler, Reply, SharedGroup};
pub use settings::resolve_config;
pub use system_env::SystemEnv;
use tokio::{net::TcpListener, sync::Mutex};
use tokio_util::sync::CancellationToken;

/// Create the shared group state for a coordinator run.
pub fn shared_group<E: Environment>(env: E, retention: RetentionWindow) -> SharedGroup<E> {
    Arc::new(Mutex::new(Group::new(env, retention)))
}

/// Coordinator configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct CoordinatorRuntimeConfig {
    /// Host to bind to (e.g., "0.0.0.0")
    pub bind_host: String,
    /// Port and retention window
    pub group: CoordinatorConfig,
}

/// Production coordinator.
///
/// Owns the listening socket and the shared group. The group lives as long
/// as the coordinator; dropping it after `run` returns tears the state down.
pub struct Coordinator {
    listener: TcpListener,
    group: SharedGroup<SystemEnv>,
    env: SystemEnv,
}

impl Coordinator {
    /// Create and bind a new coordinator.
    ///
    /// # Errors
    ///
    /// Returns error if binding to the address fails.
    pub async fn bind(config: CoordinatorRuntimeConfig) -> Result<Self, ServerError> {
        let env = SystemEnv::new();
        let listener = TcpListener::bind((config.bind_host.as_str(), config.group.port)).await?;
        let group = shared_group(env, config.group.retention);

        Ok(Self { listener, group, env })
    }

    /// Get the local address the coordinator is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the shared group, for inspection.
    pub fn group(&self) -> SharedGroup<SystemEnv> {
        Arc::clone(&self.group)
    }

    /// Accept connections until `shutdown` is cancelled.
    ///
    /// Accept errors are logged and do not stop the loop. Cancelling
    /// `shutdown` also terminates every connection task.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let addr = self.local_addr()?;
        let retention_secs = self.group.lock().await.retention().duration().as_secs();
        tracing::info!(%addr, retention_secs, "coordinator listening");

        let mut next_handle = 0u64;

        loop {
            let accepted = tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    next_handle += 1;
                    let id = HandleId(next_handle);
                    tracing::debug!(handle = %id, %peer, "accepted");

                    let handler =
                        ProtocolHandler::new(id, Arc::clone(&self.group), TcpConnector, self.env);
                    let cancel = shutdown.child_token();

                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handler.run(reader, writer, cancel).await {
                            tracing::debug!(handle = %id, error = %e, "connection error");
                        }
                    });
                },
                Err(e) => {
                    tracing::error!(error = %e, "accept error");
                },
            }
        }

        tracing::info!("coordinator shut down");
        Ok(())
    }
}
