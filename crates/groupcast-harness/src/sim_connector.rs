//! Delivery connections over the simulated network.

use std::io;

use groupcast_core::Endpoint;
use groupcast_server::Connector;
use turmoil::net::TcpStream;

/// Dials participant endpoints by turmoil host name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimConnector;

impl Connector for SimConnector {
    type Stream = TcpStream;

    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl std::future::Future<Output = io::Result<TcpStream>> + Send {
        let addr = endpoint.to_string();
        async move { TcpStream::connect(addr.as_str()).await }
    }
}
