//! HTTP/WebSocket server for the test bench daemon.
//!
//! The server:
//! - Binds a TCP listener and serves an axum router
//! - Upgrades `/ws` requests into telemetry subscribers
//! - Serves the pump catalog and start/stop endpoints under `/api`
//! - Runs the telemetry generator for its lifetime
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   BenchServer   │
//! │  TcpListener    │
//! └───────┬─────────┘
//!         │ axum::serve
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐     ┌────────────────────┐
//! │ConnectionHandler│────▶│ CommandGateway  │────▶│    PumpControl     │
//! │  /ws (per WS)   │     └─────────────────┘     │                    │
//! └─────────────────┘     ┌─────────────────┐     │                    │
//!                         │  /api handlers  │────▶│                    │
//!                         └─────────────────┘     └─────────┬──────────┘
//!                         ┌─────────────────┐               │ broadcast
//!                         │TelemetryTask    │──────▶ ConnectionRegistry
//!                         └─────────────────┘
//! ```
//!
//! # Shutdown Order
//!
//! When the cancellation token fires, the telemetry task is cancelled and
//! awaited, every subscriber is closed, and only then does axum release
//! the listening socket.

mod api;
mod connection;

pub use api::ControlResponse;
pub use connection::{ConnectionHandler, MAX_MESSAGE_SIZE};

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{ConfigError, ServerConfig};
use crate::control::PumpControl;
use crate::gateway::CommandGateway;
use crate::registry::ConnectionRegistry;
use crate::telemetry::spawn_telemetry_task;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub control: Arc<PumpControl>,
    pub gateway: CommandGateway,
    pub cancel_token: CancellationToken,
}

impl AppState {
    pub fn new(control: Arc<PumpControl>, cancel_token: CancellationToken) -> Self {
        Self {
            gateway: CommandGateway::new(Arc::clone(&control)),
            control,
            cancel_token,
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(connection::ws_handler))
        .merge(api::routes())
        .with_state(state)
}

/// Telemetry server bound to a listening socket.
pub struct BenchServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    control: Arc<PumpControl>,
    cancel_token: CancellationToken,
}

impl BenchServer {
    /// Validates `config` and binds the listening socket.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if the configuration is invalid
    /// - `ServerError::Bind` if the address cannot be bound
    pub async fn bind(
        config: ServerConfig,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let addr = config.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr, &e))?;
        let local_addr = listener.local_addr().map_err(|e| ServerError::bind(addr, &e))?;

        let registry = Arc::new(ConnectionRegistry::new(config.max_subscribers));
        let control = Arc::new(PumpControl::new(registry));

        info!(addr = %local_addr, "Bench server listening");

        Ok(Self {
            listener,
            local_addr,
            config,
            control,
            cancel_token,
        })
    }

    /// Returns the bound address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the pump controller served by this instance.
    pub fn control(&self) -> Arc<PumpControl> {
        Arc::clone(&self.control)
    }

    /// Runs the server until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// `ServerError::Serve` if the accept loop fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let telemetry = spawn_telemetry_task(
            Arc::clone(&self.control),
            self.config.tick_interval,
            self.cancel_token.clone(),
        );

        let app = router(AppState::new(
            Arc::clone(&self.control),
            self.cancel_token.clone(),
        ));

        let registry = Arc::clone(self.control.registry());
        let cancel_token = self.cancel_token.clone();
        let shutdown = async move {
            cancel_token.cancelled().await;
            info!("Server shutdown requested");

            telemetry.shutdown().await;
            let closed = registry.close_all().await;
            info!(closed, "Closed subscriber connections");
        };

        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)?;

        info!(addr = %self.local_addr, "Server cleanup complete");
        Ok(())
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Server error: {0}")]
    Serve(#[source] io::Error),
}

impl ServerError {
    fn bind(addr: SocketAddr, error: &io::Error) -> Self {
        let reason = match error.kind() {
            io::ErrorKind::AddrInUse => "address already in use; another benchd instance \
                 may be running (set PORT or --port to choose a different port)"
                .to_string(),
            io::ErrorKind::PermissionDenied => format!(
                "permission denied; port {} may require elevated privileges, \
                 consider a port above 1024",
                addr.port()
            ),
            _ => error.to_string(),
        };
        Self::Bind { addr, reason }
    }
}
