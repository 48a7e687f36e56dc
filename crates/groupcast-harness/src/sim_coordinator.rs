//! Coordinator accept loop on the simulated network.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use groupcast_core::{HandleId, RetentionWindow};
use groupcast_server::{ProtocolHandler, shared_group};
use tokio_util::sync::CancellationToken;
use turmoil::net::TcpListener;

use crate::{sim_connector::SimConnector, sim_env::SimEnv};

/// Serve the coordinator protocol on `port` until the simulation ends.
///
/// Same handler as production; only the clock and the sockets are simulated.
pub async fn serve_coordinator(port: u16, retention: RetentionWindow) -> turmoil::Result {
    let env = SimEnv::new();
    let group = shared_group(env, retention);
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?;
    tracing::info!(port, retention_secs = retention.duration().as_secs(), "sim coordinator listening");

    let mut next_handle = 0u64;
    loop {
        let (stream, peer) = listener.accept().await?;
        next_handle += 1;
        let id = HandleId(next_handle);
        tracing::debug!(handle = %id, %peer, "accepted");

        let handler = ProtocolHandler::new(id, Arc::clone(&group), SimConnector, env);
        tokio::spawn(async move {
            let (reader, writer) = stream.into_split();
            if let Err(e) = handler.run(reader, writer, CancellationToken::new()).await {
                tracing::debug!(handle = %id, error = %e, "connection error");
            }
        });
    }
}
