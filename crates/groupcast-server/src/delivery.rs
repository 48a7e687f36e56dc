//! Outbound delivery channels.
//!
//! The coordinator dials each participant's advertised endpoint and keeps
//! one writer task per ACTIVE handle. The group only ever enqueues into the
//! task's queue, so a slow or stalled participant never holds the group lock.

use std::{io, sync::Arc};

use groupcast_core::{DeliveryError, Endpoint, Outbound};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
};

/// Opens delivery connections.
///
/// Production uses `TcpConnector`; the simulation harness plugs in a
/// turmoil-backed connector.
pub trait Connector: Clone + Send + Sync + 'static {
    /// Write half used for deliveries.
    type Stream: AsyncWrite + Unpin + Send + 'static;

    /// Connect to a participant's delivery endpoint.
    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl std::future::Future<Output = io::Result<Self::Stream>> + Send;
}

/// Dials delivery endpoints over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl std::future::Future<Output = io::Result<TcpStream>> + Send {
        let addr = (endpoint.host.clone(), endpoint.port);
        async move {
            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            Ok(stream)
        }
    }
}

/// Queue feeding one participant's delivery connection.
///
/// Cloned into the registry; the writer task shuts the socket down once
/// every clone is dropped.
#[derive(Debug, Clone)]
pub struct DeliveryChannel {
    tx: mpsc::UnboundedSender<Arc<str>>,
}

impl DeliveryChannel {
    /// Dial `endpoint` and start the writer task.
    pub async fn open<C: Connector>(connector: &C, endpoint: &Endpoint) -> io::Result<Self> {
        let stream = connector.connect(endpoint).await?;
        Ok(Self::spawn(stream, endpoint.clone()))
    }

    /// Start a writer task over an already connected stream.
    pub fn spawn<S>(stream: S, endpoint: Endpoint) -> Self
    where
        S: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_deliveries(stream, rx, endpoint));
        Self { tx }
    }

    /// Whether the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Outbound for DeliveryChannel {
    fn deliver(&self, line: &Arc<str>) -> Result<(), DeliveryError> {
        self.tx.send(Arc::clone(line)).map_err(|_| DeliveryError::Closed)
    }

    fn same_channel(&self, other: &Self) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

async fn write_deliveries<S>(mut stream: S, mut rx: mpsc::UnboundedReceiver<Arc<str>>, endpoint: Endpoint)
where
    S: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        if let Err(e) = write_line(&mut stream, &line).await {
            tracing::warn!(%endpoint, error = %e, "delivery write failed, closing channel");
            return;
        }
    }

    tracing::debug!(%endpoint, "delivery channel released");
    let _ = stream.shutdown().await;
}

async fn write_line<S: AsyncWrite + Unpin>(stream: &mut S, line: &str) -> io::Result<()> {
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await
}
