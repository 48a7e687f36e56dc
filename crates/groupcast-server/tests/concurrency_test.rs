//! Concurrent senders racing a participant that keeps reconnecting.
//!
//! Every join opens a fresh delivery stream. No stream may ever carry the
//! same message twice, and the final stream of the reconnecting participant
//! must carry every message exactly once.

use std::{
    collections::HashSet,
    io,
    sync::{Arc, Mutex as StdMutex},
};

use groupcast_core::{Endpoint, HandleId, RetentionWindow};
use groupcast_server::{Connector, ProtocolHandler, Reply, SharedGroup, SystemEnv, shared_group};
use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};

const SENDERS: usize = 4;
const MESSAGES_PER_SENDER: usize = 50;
const RECONNECTS: usize = 25;

/// Connector handing out in-memory pipes, keyed by dialed port.
#[derive(Clone, Default)]
struct PipeConnector {
    dialed: Arc<StdMutex<Vec<(u16, DuplexStream)>>>,
}

impl PipeConnector {
    fn streams_for(&self, port: u16) -> Vec<DuplexStream> {
        let mut dialed = self.dialed.lock().unwrap();
        let (matching, rest): (Vec<_>, Vec<_>) = dialed.drain(..).partition(|(p, _)| *p == port);
        *dialed = rest;
        matching.into_iter().map(|(_, stream)| stream).collect()
    }
}

impl Connector for PipeConnector {
    type Stream = DuplexStream;

    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl std::future::Future<Output = io::Result<DuplexStream>> + Send {
        let (near, far) = tokio::io::duplex(1 << 20);
        self.dialed.lock().unwrap().push((endpoint.port, far));
        std::future::ready(Ok(near))
    }
}

fn handler(
    id: u64,
    group: &SharedGroup<SystemEnv>,
    connector: &PipeConnector,
) -> ProtocolHandler<SystemEnv, PipeConnector> {
    ProtocolHandler::new(HandleId(id), Arc::clone(group), connector.clone(), SystemEnv::new())
}

async fn drain(stream: DuplexStream) -> Vec<String> {
    let mut lines = BufReader::new(stream).lines();
    let mut out = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        out.push(line.split_once(": ").map(|(_, body)| body.to_string()).unwrap());
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reconnect_races_never_duplicate_or_lose_messages() {
    let group = shared_group(SystemEnv::new(), RetentionWindow::from_secs(600));
    let connector = PipeConnector::default();

    let mut senders = Vec::new();
    for i in 0..SENDERS {
        let mut h = handler(i as u64 + 1, &group, &connector);
        let line = format!("register s{i} host {}", 1000 + i);
        assert_eq!(h.process_line(&line).await, Reply::Ack);
        senders.push(h);
    }

    let mut roamer = handler(100, &group, &connector);
    assert_eq!(roamer.process_line("register roamer host 2000").await, Reply::Ack);

    let mut tasks = Vec::new();
    for (i, mut h) in senders.into_iter().enumerate() {
        tasks.push(tokio::spawn(async move {
            for k in 0..MESSAGES_PER_SENDER {
                assert_eq!(h.process_line(&format!("msend s{i}-{k}")).await, Reply::Silent);
                tokio::task::yield_now().await;
            }
            h.close().await;
        }));
    }

    let roaming = tokio::spawn(async move {
        for n in 0..RECONNECTS {
            assert_eq!(roamer.process_line("disconnect").await, Reply::Silent);
            let line = format!("reconnect roamer host {}", 2001 + n);
            assert_eq!(roamer.process_line(&line).await, Reply::Ack);
            tokio::task::yield_now().await;
        }
        roamer
    });

    for task in tasks {
        task.await.unwrap();
    }
    let mut roamer = roaming.await.unwrap();

    // Everything sent is in the log; one last reconnect must replay it all.
    assert_eq!(roamer.process_line("disconnect").await, Reply::Silent);
    assert_eq!(roamer.process_line("reconnect roamer host 3000").await, Reply::Ack);
    roamer.close().await;

    let total = SENDERS * MESSAGES_PER_SENDER;
    assert_eq!(group.lock().await.log().len(), total);
    assert!(group.lock().await.registry().is_empty());

    for port in (1000..1000 + SENDERS as u16).chain(2000..2001 + RECONNECTS as u16) {
        for stream in connector.streams_for(port) {
            let lines = drain(stream).await;
            let unique: HashSet<_> = lines.iter().collect();
            assert_eq!(unique.len(), lines.len(), "duplicate delivery on port {port}");
        }
    }

    let mut last = connector.streams_for(3000);
    assert_eq!(last.len(), 1);
    let lines = drain(last.remove(0)).await;
    let unique: HashSet<_> = lines.iter().cloned().collect();
    assert_eq!(lines.len(), total);
    assert_eq!(unique.len(), total);
    for i in 0..SENDERS {
        for k in 0..MESSAGES_PER_SENDER {
            assert!(unique.contains(&format!("s{i}-{k}")));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replays_preserve_send_order() {
    let group = shared_group(SystemEnv::new(), RetentionWindow::from_secs(600));
    let connector = PipeConnector::default();

    let mut author = handler(1, &group, &connector);
    author.process_line("register author host 1000").await;

    let mut readers = Vec::new();
    for i in 0..8u64 {
        let mut h = handler(10 + i, &group, &connector);
        h.process_line(&format!("register r{i} host {}", 1100 + i)).await;
        h.process_line("disconnect").await;
        readers.push(h);
    }

    for k in 0..20 {
        author.process_line(&format!("msend m{k}")).await;
    }

    let tasks: Vec<_> = readers
        .into_iter()
        .enumerate()
        .map(|(i, mut h)| {
            tokio::spawn(async move {
                let line = format!("reconnect r{i} host {}", 1200 + i);
                assert_eq!(h.process_line(&line).await, Reply::Ack);
                h.close().await;
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let expected: Vec<String> = (0..20).map(|k| format!("m{k}")).collect();
    for i in 0..8u16 {
        let mut streams = connector.streams_for(1200 + i);
        assert_eq!(streams.len(), 1);
        assert_eq!(drain(streams.remove(0)).await, expected, "reader {i}");
    }
    assert_eq!(group.lock().await.log().len(), 20);
}
