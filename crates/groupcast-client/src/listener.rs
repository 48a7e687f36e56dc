//! Delivery listener.
//!
//! Accepts the coordinator's delivery connection and appends every received
//! line to the participant's local log. Both the accept and each read are
//! raced against a `CancellationToken`, so a `disconnect` or `deregister`
//! releases the port promptly instead of waiting for traffic.

use std::path::PathBuf;

use tokio::{
    fs::OpenOptions,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;

/// Bound, not yet accepting, delivery port.
#[derive(Debug)]
pub struct DeliveryListener {
    listener: TcpListener,
    port: u16,
}

impl DeliveryListener {
    /// Bind the delivery port on all interfaces.
    ///
    /// # Errors
    ///
    /// Returns error if the port is in use or cannot be bound.
    pub async fn bind(port: u16) -> Result<Self, ClientError> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    /// Port actually bound.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Start writing deliveries to `log`.
    ///
    /// The task accepts exactly one connection and resolves to the number of
    /// lines written once the coordinator closes it or `cancel` fires.
    pub fn spawn(self, log: PathBuf, cancel: CancellationToken) -> JoinHandle<Result<u64, ClientError>> {
        tokio::spawn(self.serve(log, cancel))
    }

    async fn serve(self, log: PathBuf, cancel: CancellationToken) -> Result<u64, ClientError> {
        let port = self.port;
        let accepted = tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(port, "listener cancelled before coordinator connected");
                return Ok(0);
            },
            accepted = self.listener.accept() => accepted?,
        };
        let (socket, peer) = accepted;
        // One delivery connection per join; stop listening right away.
        drop(self.listener);
        tracing::debug!(port, %peer, "coordinator connected");

        let mut file = OpenOptions::new().create(true).append(true).open(&log).await?;
        let mut lines = BufReader::new(socket).lines();
        let mut written = 0u64;

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => break,
                next = lines.next_line() => next?,
            };
            let Some(line) = next else {
                tracing::debug!(port, "coordinator closed delivery connection");
                break;
            };

            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await?;
            written += 1;
        }

        tracing::debug!(port, written, "delivery listener stopped");
        Ok(written)
    }
}
