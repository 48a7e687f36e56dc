//! Participant command relay.
//!
//! Turns user input into wire commands on the inbound connection and owns
//! the delivery listener that must be running before a join is announced.
//!
//! The coordinator only answers joins (empty line, or `error: <reason>`) and
//! rejected lines. A rejected `msend`, `deregister` or `disconnect` is never
//! awaited, so its error line can still be in flight when the next join waits
//! for its acknowledgement. Such lines name their own command and are
//! collected as notices instead of being read as the join's answer.

use groupcast_core::{
    Command, Endpoint, ParticipantConfig, ProtocolError, command::parse_port,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{error::ClientError, listener::DeliveryListener};

/// Prefix of a rejection line on the inbound connection.
const ERROR_PREFIX: &str = "error: ";

/// Commands that are never acknowledged.
const SILENT_COMMANDS: [&str; 3] = ["msend", "deregister", "disconnect"];

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// `register <port>`
    Register {
        /// Local delivery port.
        port: u16,
    },
    /// `deregister`
    Deregister,
    /// `disconnect`
    Disconnect,
    /// `reconnect <port>`
    Reconnect {
        /// Local delivery port.
        port: u16,
    },
    /// `msend <words...>`
    Msend {
        /// Message words.
        words: Vec<String>,
    },
    /// `quit`
    Quit,
}

impl UserCommand {
    /// Parse one line of user input.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut tokens = line.split_ascii_whitespace();
        let keyword = tokens.next().ok_or(ProtocolError::Empty)?;
        let args: Vec<&str> = tokens.collect();

        match (keyword, args.as_slice()) {
            ("register", [port]) => Ok(Self::Register { port: parse_port(port)? }),
            ("reconnect", [port]) => Ok(Self::Reconnect { port: parse_port(port)? }),
            ("register" | "reconnect", _) => Err(ProtocolError::Arity {
                command: if keyword == "register" { "register" } else { "reconnect" },
                expected: "1",
                actual: args.len(),
            }),
            ("deregister", []) => Ok(Self::Deregister),
            ("disconnect", []) => Ok(Self::Disconnect),
            ("quit", []) => Ok(Self::Quit),
            ("deregister" | "disconnect" | "quit", _) => Err(ProtocolError::Arity {
                command: match keyword {
                    "deregister" => "deregister",
                    "disconnect" => "disconnect",
                    _ => "quit",
                },
                expected: "0",
                actual: args.len(),
            }),
            ("msend", []) => {
                Err(ProtocolError::Arity { command: "msend", expected: "at least 1", actual: 0 })
            },
            ("msend", words) => {
                Ok(Self::Msend { words: words.iter().map(ToString::to_string).collect() })
            },
            (other, _) => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// Whether the input loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command.
    Continue,
    /// User asked to quit.
    Quit,
}

struct Delivery {
    port: u16,
    cancel: CancellationToken,
    task: JoinHandle<Result<u64, ClientError>>,
}

/// A participant's session with the coordinator.
pub struct Participant<W> {
    config: ParticipantConfig,
    advertise_host: String,
    commands: W,
    replies: mpsc::UnboundedReceiver<String>,
    reply_task: JoinHandle<()>,
    delivery: Option<Delivery>,
    notices: Vec<String>,
}

impl Participant<tokio::net::tcp::OwnedWriteHalf> {
    /// Open the inbound connection to the configured coordinator.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    pub async fn connect(
        config: ParticipantConfig,
        advertise_host: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let addr = (config.coordinator_host.clone(), config.coordinator_port);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        tracing::info!(
            coordinator = %Endpoint::new(&config.coordinator_host, config.coordinator_port),
            identity = %config.identity,
            "connected"
        );
        Ok(Self::new(config, advertise_host, reader, writer))
    }
}

impl<W> Participant<W>
where
    W: AsyncWrite + Unpin,
{
    /// Session over an already open inbound connection.
    pub fn new<R>(
        config: ParticipantConfig,
        advertise_host: impl Into<String>,
        reader: R,
        commands: W,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, replies) = mpsc::unbounded_channel();
        let reply_task = tokio::spawn(forward_replies(reader, tx));
        Self {
            config,
            advertise_host: advertise_host.into(),
            commands,
            replies,
            reply_task,
            delivery: None,
            notices: Vec::new(),
        }
    }

    /// Participant settings.
    pub fn config(&self) -> &ParticipantConfig {
        &self.config
    }

    /// Port of the running delivery listener, if any.
    pub fn delivery_port(&self) -> Option<u16> {
        self.delivery.as_ref().map(|d| d.port)
    }

    /// Error lines received for commands that were not awaited.
    pub fn take_notices(&mut self) -> Vec<String> {
        while let Ok(line) = self.replies.try_recv() {
            self.note(line);
        }
        std::mem::take(&mut self.notices)
    }

    /// Run one user command.
    ///
    /// # Errors
    ///
    /// `Rejected` when the coordinator refuses a join, `NoAck` when the
    /// connection drops while waiting for one, `Io` on socket or bind
    /// failures.
    pub async fn execute(&mut self, command: UserCommand) -> Result<Flow, ClientError> {
        match command {
            UserCommand::Register { port } => self.join(port, false).await?,
            UserCommand::Reconnect { port } => self.join(port, true).await?,
            UserCommand::Deregister => {
                self.send(&Command::Deregister).await?;
                self.stop_delivery().await;
            },
            UserCommand::Disconnect => {
                self.send(&Command::Disconnect).await?;
                self.stop_delivery().await;
            },
            UserCommand::Msend { words } => self.send(&Command::Msend { words }).await?,
            UserCommand::Quit => {
                self.stop_delivery().await;
                return Ok(Flow::Quit);
            },
        }
        Ok(Flow::Continue)
    }

    async fn join(&mut self, port: u16, replay: bool) -> Result<(), ClientError> {
        // The listener must be up before the coordinator is told to dial it.
        let listener = DeliveryListener::bind(port).await?;
        let bound = listener.port();
        let cancel = CancellationToken::new();
        let task = listener.spawn(self.config.log_path.clone(), cancel.clone());
        let pending = Delivery { port: bound, cancel, task };

        let identity = self.config.identity.clone();
        let endpoint = Endpoint::new(&self.advertise_host, bound);
        let command = if replay {
            Command::Reconnect { identity, endpoint }
        } else {
            Command::Register { identity, endpoint }
        };
        let keyword = command.keyword();

        let outcome = match self.send(&command).await {
            Ok(()) => self.await_ack(keyword).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                tracing::info!(command = keyword, port = bound, "joined");
                if let Some(previous) = self.delivery.replace(pending) {
                    stop(previous).await;
                }
                Ok(())
            },
            Err(e) => {
                tracing::warn!(command = keyword, port = bound, error = %e, "join failed");
                stop(pending).await;
                Err(e)
            },
        }
    }

    async fn await_ack(&mut self, command: &'static str) -> Result<(), ClientError> {
        loop {
            let Some(line) = self.replies.recv().await else {
                return Err(ClientError::NoAck { command });
            };
            match line.strip_prefix(ERROR_PREFIX) {
                None if line.is_empty() => return Ok(()),
                Some(reason) if !is_stale(reason) => {
                    return Err(ClientError::Rejected { command, reason: reason.to_string() });
                },
                _ => {},
            }
            self.note(line);
        }
    }

    async fn send(&mut self, command: &Command) -> Result<(), ClientError> {
        tracing::debug!(command = command.keyword(), "sending");
        let line = format!("{command}\n");
        self.commands.write_all(line.as_bytes()).await?;
        self.commands.flush().await?;
        Ok(())
    }

    async fn stop_delivery(&mut self) {
        if let Some(delivery) = self.delivery.take() {
            stop(delivery).await;
        }
    }

    fn note(&mut self, line: String) {
        tracing::warn!(reply = %line, "coordinator reported an error");
        self.notices.push(line);
    }
}

impl<W> Drop for Participant<W> {
    fn drop(&mut self) {
        if let Some(delivery) = &self.delivery {
            delivery.cancel.cancel();
        }
        self.reply_task.abort();
    }
}

fn is_stale(reason: &str) -> bool {
    SILENT_COMMANDS.iter().any(|keyword| {
        reason.strip_prefix(keyword).is_some_and(|rest| rest.starts_with(' '))
    })
}

/// Cancel the listener and wait until its port is released.
async fn stop(delivery: Delivery) {
    delivery.cancel.cancel();
    match delivery.task.await {
        Ok(Ok(written)) => tracing::debug!(port = delivery.port, written, "delivery stopped"),
        Ok(Err(e)) => tracing::warn!(port = delivery.port, error = %e, "delivery listener failed"),
        Err(e) => tracing::warn!(port = delivery.port, error = %e, "delivery listener panicked"),
    }
}

async fn forward_replies<R: AsyncRead + Unpin>(reader: R, tx: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).is_err() {
                    return;
                }
            },
            Ok(None) => {
                tracing::info!("coordinator closed the command connection");
                return;
            },
            Err(e) => {
                tracing::warn!(error = %e, "command connection failed");
                return;
            },
        }
    }
}
