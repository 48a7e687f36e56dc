//! Participant driven from a turmoil client.
//!
//! Mirrors the production participant: the delivery listener is bound and
//! accepting before a join is announced, and every join collects into a new
//! session so tests can check each delivery connection separately.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use groupcast_core::{Command, Endpoint};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use turmoil::net::{
    TcpListener, TcpStream,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
};

type Inbox = Arc<Mutex<Vec<String>>>;

struct Delivery {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Simulated participant.
pub struct SimParticipant {
    identity: String,
    replies: Lines<BufReader<OwnedReadHalf>>,
    commands: OwnedWriteHalf,
    sessions: Vec<Inbox>,
    delivery: Option<Delivery>,
}

impl SimParticipant {
    /// Connect to the coordinator at `coordinator` (`"host:port"`).
    ///
    /// `identity` doubles as this host's turmoil name, which the coordinator
    /// dials for deliveries.
    pub async fn connect(identity: &str, coordinator: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(coordinator).await?;
        let (reader, commands) = stream.into_split();
        Ok(Self {
            identity: identity.to_string(),
            replies: BufReader::new(reader).lines(),
            commands,
            sessions: Vec::new(),
            delivery: None,
        })
    }

    /// Join as a fresh entrant, receiving deliveries on `port`.
    pub async fn register(&mut self, port: u16) -> io::Result<()> {
        let endpoint = Endpoint::new(&self.identity, port);
        self.join(Command::Register { identity: self.identity.clone(), endpoint }, port).await
    }

    /// Rejoin after `disconnect`, receiving deliveries on `port`.
    pub async fn reconnect(&mut self, port: u16) -> io::Result<()> {
        let endpoint = Endpoint::new(&self.identity, port);
        self.join(Command::Reconnect { identity: self.identity.clone(), endpoint }, port).await
    }

    /// Leave temporarily.
    pub async fn disconnect(&mut self) -> io::Result<()> {
        self.send(&Command::Disconnect).await?;
        self.stop_delivery().await;
        Ok(())
    }

    /// Leave for good.
    pub async fn deregister(&mut self) -> io::Result<()> {
        self.send(&Command::Deregister).await?;
        self.stop_delivery().await;
        Ok(())
    }

    /// Multicast `text` (split into words).
    pub async fn msend(&mut self, text: &str) -> io::Result<()> {
        let words = text.split_ascii_whitespace().map(str::to_string).collect();
        self.send(&Command::Msend { words }).await
    }

    /// Every line delivered so far, across all sessions.
    pub fn received(&self) -> Vec<String> {
        self.sessions.iter().flat_map(snapshot).collect()
    }

    /// Lines delivered on the `n`th join's connection.
    pub fn session(&self, n: usize) -> Vec<String> {
        self.sessions.get(n).map(snapshot).unwrap_or_default()
    }

    /// Number of joins so far.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Wait (virtual time) until at least `count` lines arrived in total.
    ///
    /// Gives up after `timeout` and returns what arrived.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<String> {
        let poll = Duration::from_millis(10);
        let mut waited = Duration::ZERO;
        loop {
            let received = self.received();
            if received.len() >= count || waited >= timeout {
                return received;
            }
            tokio::time::sleep(poll).await;
            waited += poll;
        }
    }

    async fn join(&mut self, command: Command, port: u16) -> io::Result<()> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?;
        let inbox = Inbox::default();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(collect(listener, Arc::clone(&inbox), cancel.clone()));
        let pending = Delivery { cancel, task };

        let keyword = command.keyword();
        let reply = match self.send(&command).await {
            Ok(()) => self.replies.next_line().await,
            Err(e) => Err(e),
        };

        match reply {
            Ok(Some(line)) if line.is_empty() => {
                self.stop_delivery().await;
                self.delivery = Some(pending);
                self.sessions.push(inbox);
                Ok(())
            },
            other => {
                stop(pending).await;
                let reason = match other {
                    Ok(Some(line)) => line,
                    Ok(None) => "connection closed".to_string(),
                    Err(e) => e.to_string(),
                };
                Err(io::Error::other(format!("{keyword} failed: {reason}")))
            },
        }
    }

    async fn send(&mut self, command: &Command) -> io::Result<()> {
        self.commands.write_all(format!("{command}\n").as_bytes()).await?;
        self.commands.flush().await
    }

    async fn stop_delivery(&mut self) {
        if let Some(delivery) = self.delivery.take() {
            stop(delivery).await;
        }
    }
}

fn snapshot(inbox: &Inbox) -> Vec<String> {
    inbox.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

async fn stop(delivery: Delivery) {
    delivery.cancel.cancel();
    let _ = delivery.task.await;
}

async fn collect(listener: TcpListener, inbox: Inbox, cancel: CancellationToken) {
    let socket = tokio::select! {
        () = cancel.cancelled() => return,
        accepted = listener.accept() => match accepted {
            Ok((socket, _)) => socket,
            Err(e) => {
                tracing::warn!(error = %e, "sim delivery accept failed");
                return;
            },
        },
    };
    drop(listener);

    let mut lines = BufReader::new(socket).lines();
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => return,
            next = lines.next_line() => next,
        };
        match next {
            Ok(Some(line)) => inbox.lock().unwrap_or_else(PoisonError::into_inner).push(line),
            Ok(None) | Err(_) => return,
        }
    }
}
