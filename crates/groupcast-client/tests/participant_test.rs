//! Participants against a real coordinator over loopback TCP.

use std::{path::Path, time::Duration};

use groupcast_client::{ClientError, Participant, UserCommand};
use groupcast_core::{CoordinatorConfig, ParticipantConfig, RetentionWindow};
use groupcast_server::{Coordinator, CoordinatorRuntimeConfig};
use tokio_util::sync::CancellationToken;

async fn start_coordinator() -> (u16, CancellationToken) {
    let config = CoordinatorRuntimeConfig {
        bind_host: "127.0.0.1".to_string(),
        group: CoordinatorConfig { port: 0, retention: RetentionWindow::from_secs(60) },
    };
    let coordinator = Coordinator::bind(config).await.unwrap();
    let port = coordinator.local_addr().unwrap().port();
    let shutdown = CancellationToken::new();
    tokio::spawn(coordinator.run(shutdown.clone()));
    (port, shutdown)
}

async fn participant(
    identity: &str,
    log_path: &Path,
    coordinator_port: u16,
) -> Participant<tokio::net::tcp::OwnedWriteHalf> {
    let config = ParticipantConfig {
        identity: identity.to_string(),
        log_path: log_path.to_path_buf(),
        coordinator_host: "127.0.0.1".to_string(),
        coordinator_port,
    };
    Participant::connect(config, "127.0.0.1").await.unwrap()
}

fn msend(text: &str) -> UserCommand {
    UserCommand::Msend { words: text.split(' ').map(str::to_string).collect() }
}

/// Wait until the log holds `count` lines.
async fn log_lines(path: &Path, count: usize) -> Vec<String> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let contents = tokio::fs::read_to_string(path).await.unwrap_or_default();
            let lines: Vec<String> = contents.lines().map(str::to_string).collect();
            if lines.len() >= count {
                return lines;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap()
}

/// Wait until the coordinator has processed every command `p` sent so far.
///
/// A `msend` from a participant that is not active is answered with an error
/// line, and replies come back in command order.
async fn barrier(p: &mut Participant<tokio::net::tcp::OwnedWriteHalf>) {
    p.execute(msend("ping")).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let notices = p.take_notices();
            if !notices.is_empty() {
                assert!(notices[0].starts_with("error: msend not allowed"), "{notices:?}");
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

fn bodies(lines: &[String]) -> Vec<&str> {
    lines.iter().map(|l| l.split_once(": ").unwrap().1).collect()
}

#[tokio::test]
async fn delivered_messages_land_in_local_logs() {
    let (port, shutdown) = start_coordinator().await;
    let dir = tempfile::tempdir().unwrap();
    let (alice_log, bob_log) = (dir.path().join("alice.log"), dir.path().join("bob.log"));

    let mut alice = participant("alice", &alice_log, port).await;
    let mut bob = participant("bob", &bob_log, port).await;
    alice.execute(UserCommand::Register { port: 0 }).await.unwrap();
    bob.execute(UserCommand::Register { port: 0 }).await.unwrap();

    alice.execute(msend("hi bob")).await.unwrap();

    let lines = log_lines(&bob_log, 1).await;
    assert!(lines[0].starts_with('(') && lines[0].contains(") alice: hi bob"), "{lines:?}");
    assert_eq!(log_lines(&alice_log, 1).await, lines);

    shutdown.cancel();
}

#[tokio::test]
async fn reconnect_appends_missed_messages() {
    let (port, shutdown) = start_coordinator().await;
    let dir = tempfile::tempdir().unwrap();
    let (alice_log, bob_log) = (dir.path().join("alice.log"), dir.path().join("bob.log"));

    let mut alice = participant("alice", &alice_log, port).await;
    let mut bob = participant("bob", &bob_log, port).await;
    alice.execute(UserCommand::Register { port: 0 }).await.unwrap();
    bob.execute(UserCommand::Register { port: 0 }).await.unwrap();

    alice.execute(msend("before")).await.unwrap();
    log_lines(&bob_log, 1).await;

    bob.execute(UserCommand::Disconnect).await.unwrap();
    barrier(&mut bob).await;
    alice.execute(msend("during one")).await.unwrap();
    alice.execute(msend("during two")).await.unwrap();
    log_lines(&alice_log, 3).await;

    bob.execute(UserCommand::Reconnect { port: 0 }).await.unwrap();
    let lines = log_lines(&bob_log, 4).await;
    // The whole window is replayed, including the message seen before leaving.
    assert_eq!(bodies(&lines), ["before", "before", "during one", "during two"]);

    shutdown.cancel();
}

#[tokio::test]
async fn deregistered_participant_must_register_again() {
    let (port, shutdown) = start_coordinator().await;
    let dir = tempfile::tempdir().unwrap();
    let (alice_log, bob_log) = (dir.path().join("alice.log"), dir.path().join("bob.log"));

    let mut alice = participant("alice", &alice_log, port).await;
    let mut bob = participant("bob", &bob_log, port).await;
    alice.execute(UserCommand::Register { port: 0 }).await.unwrap();
    bob.execute(UserCommand::Register { port: 0 }).await.unwrap();

    bob.execute(UserCommand::Deregister).await.unwrap();
    barrier(&mut bob).await;
    alice.execute(msend("missed")).await.unwrap();
    log_lines(&alice_log, 1).await;

    let err = bob.execute(UserCommand::Reconnect { port: 0 }).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { command: "reconnect", .. }), "{err}");
    assert_eq!(bob.delivery_port(), None);

    bob.execute(UserCommand::Register { port: 0 }).await.unwrap();
    alice.execute(msend("welcome back")).await.unwrap();

    let lines = log_lines(&bob_log, 1).await;
    assert_eq!(bodies(&lines), ["welcome back"]);

    shutdown.cancel();
}
