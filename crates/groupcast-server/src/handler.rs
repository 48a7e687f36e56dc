//! Per-connection protocol handler.
//!
//! One `ProtocolHandler` runs per accepted connection, as its own task. It
//! reads command lines strictly in arrival order, drives the
//! `ParticipantHandle` state machine and mutates the shared group. Replies
//! on the inbound connection are an empty line after a successful
//! register/reconnect and `error: <reason>` after a rejected line; every
//! other accepted command is silent.

use std::sync::Arc;

use groupcast_core::{
    Command, Endpoint, Environment, Group, HandleId, HandleState, ParticipantHandle, Transition,
    format_message,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

use crate::{
    delivery::{Connector, DeliveryChannel},
    error::ServerError,
};

/// Group state shared by every handler: one lock for registry and log.
pub type SharedGroup<E> = Arc<Mutex<Group<E, DeliveryChannel>>>;

/// Response to one inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing is written back.
    Silent,
    /// Empty acknowledgement line.
    Ack,
    /// `error: <reason>` line.
    Rejected(String),
}

impl Reply {
    /// Bytes written on the inbound connection.
    fn wire(&self) -> Option<String> {
        match self {
            Self::Silent => None,
            Self::Ack => Some("\n".to_string()),
            Self::Rejected(reason) => Some(format!("error: {reason}\n")),
        }
    }
}

/// State machine driver for one inbound connection.
pub struct ProtocolHandler<E, C>
where
    E: Environment,
{
    handle: ParticipantHandle,
    outbound: Option<DeliveryChannel>,
    group: SharedGroup<E>,
    connector: C,
    env: E,
}

impl<E, C> ProtocolHandler<E, C>
where
    E: Environment,
    C: Connector,
{
    /// Handler for connection `id`.
    pub fn new(id: HandleId, group: SharedGroup<E>, connector: C, env: E) -> Self {
        Self { handle: ParticipantHandle::new(id), outbound: None, group, connector, env }
    }

    /// Current participant state.
    pub fn handle(&self) -> &ParticipantHandle {
        &self.handle
    }

    /// Serve the connection until EOF, a read/write failure, or `cancel`.
    ///
    /// Always leaves the group on the way out.
    pub async fn run<R, W>(
        mut self,
        reader: R,
        mut writer: W,
        cancel: CancellationToken,
    ) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let id = self.handle.id();
        tracing::debug!(handle = %id, "connection accepted");

        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        let result = loop {
            buf.clear();
            let read = tokio::select! {
                () = cancel.cancelled() => break Ok(()),
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => break Ok(()),
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let reply = self.process_line(&line).await;
                    if let Some(bytes) = reply.wire() {
                        if let Err(e) = write_reply(&mut writer, &bytes).await {
                            break Err(ServerError::from(e));
                        }
                    }
                },
                Err(e) => break Err(ServerError::from(e)),
            }
        };

        self.close().await;
        tracing::debug!(handle = %id, "connection closed");
        result
    }

    /// Interpret one line and apply its effects.
    pub async fn process_line(&mut self, line: &str) -> Reply {
        let id = self.handle.id();
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(handle = %id, error = %e, "unparseable command");
                return Reply::Rejected(e.to_string());
            },
        };
        tracing::debug!(handle = %id, command = command.keyword(), "command");

        self.reconcile().await;

        match self.handle.plan(command) {
            Ok(Transition::Join { identity, endpoint, replay }) => {
                self.join(identity, &endpoint, replay).await
            },
            Ok(Transition::Leave { next }) => self.leave(next).await,
            Ok(Transition::Send { words }) => self.send(&words).await,
            Err(e) => {
                tracing::warn!(handle = %id, state = %self.handle.state(), error = %e, "rejected");
                Reply::Rejected(e.to_string())
            },
        }
    }

    /// Deregister if still a member and release the delivery channel.
    pub async fn close(&mut self) {
        if self.handle.state() == HandleState::Active {
            self.group.lock().await.deregister(self.handle.id());
        }
        self.outbound = None;
    }

    async fn join(&mut self, identity: String, endpoint: &Endpoint, replay: bool) -> Reply {
        let id = self.handle.id();

        // Dial before touching the group: a failed dial leaves state unchanged.
        let channel = match DeliveryChannel::open(&self.connector, endpoint).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(handle = %id, %endpoint, error = %e, "cannot open delivery channel");
                return Reply::Rejected(format!("cannot reach {endpoint}: {e}"));
            },
        };

        let joined = {
            let mut group = self.group.lock().await;
            if replay {
                group.rejoin(id, channel.clone()).map(|report| report.replayed)
            } else {
                group.register(id, channel.clone());
                Ok(0)
            }
        };

        match joined {
            Ok(replayed) => {
                tracing::info!(handle = %id, %identity, %endpoint, replay, replayed, "joined group");
                self.handle.activate(identity);
                self.outbound = Some(channel);
                Reply::Ack
            },
            Err(e) => {
                tracing::warn!(handle = %id, error = %e, "rejoin failed");
                Reply::Rejected(e.to_string())
            },
        }
    }

    async fn leave(&mut self, next: HandleState) -> Reply {
        let id = self.handle.id();
        self.group.lock().await.deregister(id);
        self.outbound = None;
        self.handle.leave(next);
        tracing::info!(handle = %id, state = %next, "left group");
        Reply::Silent
    }

    async fn send(&self, words: &[String]) -> Reply {
        let identity = self.handle.identity().unwrap_or_default();
        let message = format_message(self.env.wall_clock(), identity, words);

        // Mutation under the lock, delivery after releasing it.
        let fanout = self.group.lock().await.multicast(Arc::from(message));
        let report = fanout.deliver();

        if !report.failed.is_empty() {
            self.group.lock().await.evict(&fanout, &report.failed);
        }
        Reply::Silent
    }

    async fn reconcile(&mut self) {
        if self.handle.state() != HandleState::Active {
            return;
        }
        let is_member = self.group.lock().await.is_member(self.handle.id());
        if self.handle.reconcile(is_member) {
            tracing::warn!(handle = %self.handle.id(), "evicted after delivery failure, now disconnected");
            self.outbound = None;
        }
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &str) -> std::io::Result<()> {
    writer.write_all(bytes.as_bytes()).await?;
    writer.flush().await
}
