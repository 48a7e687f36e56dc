//! Groupcast coordinator binary.
//!
//! # Usage
//!
//! ```bash
//! # Legacy config file: listen port on line 1, retention seconds on line 2
//! groupcast-coordinator --config coordinator.conf
//!
//! # Flags only
//! groupcast-coordinator --port 5000 --retention-secs 30
//! ```

use std::path::PathBuf;

use clap::Parser;
use groupcast_server::{Coordinator, CoordinatorRuntimeConfig, resolve_config};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Groupcast coordinator
#[derive(Parser, Debug)]
#[command(name = "groupcast-coordinator")]
#[command(about = "Group messaging coordinator with time-bounded replay")]
#[command(version)]
struct Args {
    /// Config file (port, then retention window in seconds)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Retention window in seconds (overrides the config file)
    #[arg(short, long)]
    retention_secs: Option<u64>,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    bind_host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let group = resolve_config(args.config.as_deref(), args.port, args.retention_secs)?;
    tracing::info!("Groupcast coordinator starting");

    let config = CoordinatorRuntimeConfig { bind_host: args.bind_host, group };
    let coordinator = Coordinator::bind(config).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
        }
        signal.cancel();
    });

    coordinator.run(shutdown).await?;

    Ok(())
}
