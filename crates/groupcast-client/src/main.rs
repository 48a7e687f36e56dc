//! Groupcast participant binary.
//!
//! # Usage
//!
//! ```bash
//! # Config file: participant id, log file path, then coordinator host and port
//! groupcast-participant participant.conf
//!
//! participant> register 7001
//! participant> msend hello everyone
//! participant> disconnect
//! participant> reconnect 7001
//! participant> quit
//! ```

use std::path::PathBuf;

use clap::Parser;
use groupcast_client::{Flow, Participant, UserCommand};
use groupcast_core::ParticipantConfig;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const PROMPT: &str = "participant> ";

/// Groupcast participant
#[derive(Parser, Debug)]
#[command(name = "groupcast-participant")]
#[command(about = "Join a groupcast group and log delivered messages")]
#[command(version)]
struct Args {
    /// Config file
    config: PathBuf,

    /// Address the coordinator should dial for deliveries
    #[arg(long, default_value = "127.0.0.1")]
    advertise_host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = ParticipantConfig::load(&args.config)?;
    let mut participant = Participant::connect(config, args.advertise_host).await?;

    let mut stdout = tokio::io::stdout();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        say(&mut stdout, PROMPT).await?;
        let Some(line) = input.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match UserCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                say(&mut stdout, &format!("{e}\n")).await?;
                continue;
            },
        };

        let result = participant.execute(command).await;
        for notice in participant.take_notices() {
            say(&mut stdout, &format!("{notice}\n")).await?;
        }

        match result {
            Ok(Flow::Continue) => {},
            Ok(Flow::Quit) => break,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => say(&mut stdout, &format!("{e}\n")).await?,
        }
    }

    Ok(())
}

async fn say(stdout: &mut Stdout, text: &str) -> std::io::Result<()> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await
}
