//! busy-gate service.
//!
//! # Architecture Overview
//!
//! ```text
//!   Dashboard (browser)                         busy-gate
//!   ───────────────────                  ┌──────────────────────────────┐
//!   data calls  ── /api/* ─────────────▶ │ forward → GatedClient ───────┼──▶ data service
//!                                        │              │               │
//!                                        │         RequestGate          │
//!                                        │              │ set_global    │
//!   keyed actions ── PUT/DELETE /keys ─▶ │          BusyState ◀─ set_for│
//!                                        │              │               │
//!   spinner  ◀── /status/ws, /status ────┼──────────────┘               │
//!                                        └──────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use busy_gate::config::{load_config, watcher::ConfigWatcher, AppConfig};
use busy_gate::http::server::shutdown_signal;
use busy_gate::observability::{logging, metrics};
use busy_gate::HttpServer;

#[derive(Parser)]
#[command(name = "busy-gate")]
#[command(about = "Busy-state coordinator for the portfolio dashboard", long_about = None)]
struct Args {
    /// TOML configuration file. Watched for skip-policy changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!("busy-gate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.server.bind_address,
        upstream = ?config.server.upstream,
        quiet_paths = ?config.gate.quiet_paths,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config);
    server.run(listener, config_updates, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
