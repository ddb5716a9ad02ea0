//! benchd - SIA test bench telemetry server
//!
//! Serves simulated pump telemetry over WebSocket (`/ws`) and a small
//! HTTP control API (`/api/pumps`, `/api/pump/start`, `/api/pump/stop`).
//!
//! # Usage
//!
//! ```bash
//! # Listen on 0.0.0.0:8080
//! benchd
//!
//! # Custom port via environment or flag
//! PORT=9000 benchd
//! benchd --host 127.0.0.1 --port 9000 --tick-ms 250
//! ```

use std::net::IpAddr;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use benchd::config::{ServerConfig, HOST_ENV, PORT_ENV};
use benchd::server::BenchServer;

/// SIA test bench - live pump telemetry server
#[derive(Parser, Debug)]
#[command(name = "benchd", version, about)]
struct Args {
    /// Address to bind [default: $BENCH_HOST or 0.0.0.0]
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on [default: $PORT or 8080]
    #[arg(short, long)]
    port: Option<u16>,

    /// Telemetry period in milliseconds
    #[arg(long, value_name = "MS")]
    tick_ms: Option<u64>,

    /// Maximum concurrent WebSocket subscribers
    #[arg(long)]
    max_subscribers: Option<usize>,
}

impl Args {
    /// Layers the flags over `config`.
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ms) = self.tick_ms {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(max) = self.max_subscribers {
            config.max_subscribers = max;
        }
        config
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let env_config = ServerConfig::from_env()
        .with_context(|| format!("Invalid {PORT_ENV}/{HOST_ENV} in environment"))?;
    run(args.apply(env_config))
}

#[tokio::main]
async fn run(config: ServerConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("benchd=info".parse()?)
                .add_directive("bench_core=info".parse()?)
                .add_directive("bench_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Test bench server starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let addr = config.bind_addr();
    let server = BenchServer::bind(config, cancel_token)
        .await
        .with_context(|| format!("Failed to start server on {addr}"))?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Test bench server stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
