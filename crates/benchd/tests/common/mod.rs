//! Shared helpers for the benchd integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()`; the panic-free behavior of
//! production code is checked through assertions.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{client_async, connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use bench_core::{PumpState, TelemetrySample};
use bench_protocol::{ClientMessage, ServerMessage};
use benchd::config::ServerConfig;
use benchd::control::PumpControl;
use benchd::server::{BenchServer, ServerError};

// ============================================================================
// Constants
// ============================================================================

/// Tick period used by most tests
pub const FAST_TICK: Duration = Duration::from_millis(20);

/// Tick period long enough that only the immediate first tick fires
pub const SLOW_TICK: Duration = Duration::from_secs(3600);

/// Maximum time to wait for any single frame
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Window used to assert that nothing arrives
pub const QUIET_WINDOW: Duration = Duration::from_millis(200);

/// Maximum time to wait for the server task to exit
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Receive buffer for clients that never read, so the server's writes back up
pub const STALLED_RECV_BUFFER: u32 = 4096;

// ============================================================================
// Test Server
// ============================================================================

/// Test server bound to an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub control: Arc<PumpControl>,
    cancel_token: CancellationToken,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    /// Spawns a server with the given tick period.
    pub async fn spawn(tick_interval: Duration) -> Self {
        Self::spawn_with(ServerConfig {
            tick_interval,
            ..ServerConfig::ephemeral()
        })
        .await
    }

    /// Spawns a server with a custom configuration.
    pub async fn spawn_with(config: ServerConfig) -> Self {
        let cancel_token = CancellationToken::new();
        let server = BenchServer::bind(config, cancel_token.clone())
            .await
            .expect("bind test server");
        let addr = server.local_addr();
        let control = server.control();
        let handle = tokio::spawn(server.run());

        Self {
            addr,
            control,
            cancel_token,
            handle,
        }
    }

    /// Opens a WebSocket client against `/ws`.
    pub async fn connect(&self) -> TestClient {
        let url = format!("ws://{}/ws", self.addr);
        let (ws, _) = connect_async(url).await.expect("connect to /ws");
        TestClient { ws }
    }

    /// Opens a client with a tiny receive buffer that never reads.
    pub async fn connect_stalled(&self) -> StalledClient {
        let socket = TcpSocket::new_v4().expect("create socket");
        socket
            .set_recv_buffer_size(STALLED_RECV_BUFFER)
            .expect("shrink receive buffer");
        let stream = socket.connect(self.addr).await.expect("connect tcp");

        let url = format!("ws://{}/ws", self.addr);
        let (ws, _) = client_async(url, stream).await.expect("websocket handshake");
        StalledClient { _ws: ws }
    }

    /// Opens a client and consumes the initial state message.
    pub async fn connect_ready(&self) -> (TestClient, PumpState) {
        let mut client = self.connect().await;
        let state = client.expect_state().await;
        (client, state)
    }

    /// Base URL for HTTP requests.
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Cancels the server and waits for `run` to return.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        self.cancel_token.cancel();
        timeout(SHUTDOWN_TIMEOUT, self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }

    /// Cancels the server without waiting.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

// ============================================================================
// Test Client
// ============================================================================

/// WebSocket client with protocol helpers.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

/// Client that holds its connection open without reading a single frame.
pub struct StalledClient {
    _ws: WebSocketStream<TcpStream>,
}

/// What the client observed when waiting for the server to hang up.
#[derive(Debug, PartialEq, Eq)]
pub enum Hangup {
    Close(Option<CloseCode>),
    Ended,
}

impl TestClient {
    /// Sends a typed client message.
    pub async fn send(&mut self, msg: ClientMessage) {
        self.send_text(&msg.to_value().to_string()).await;
    }

    /// Sends a raw text frame.
    pub async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string()))
            .await
            .expect("send frame");
    }

    /// Receives the next server message, skipping control frames.
    pub async fn recv(&mut self) -> ServerMessage {
        loop {
            let frame = timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .expect("websocket error");
            match frame {
                Message::Text(text) => return serde_json::from_str(&text).expect("decode frame"),
                Message::Close(frame) => panic!("Unexpected close: {frame:?}"),
                _ => continue,
            }
        }
    }

    /// Receives the next message, which must be a state message.
    pub async fn expect_state(&mut self) -> PumpState {
        match self.recv().await {
            ServerMessage::State { state } => state,
            other => panic!("Expected state, got {other:?}"),
        }
    }

    /// Skips telemetry until a state message arrives.
    pub async fn next_state(&mut self) -> PumpState {
        loop {
            if let ServerMessage::State { state } = self.recv().await {
                return state;
            }
        }
    }

    /// Skips state messages until a telemetry sample arrives.
    pub async fn next_data(&mut self) -> TelemetrySample {
        loop {
            if let ServerMessage::Data(sample) = self.recv().await {
                return sample;
            }
        }
    }

    /// Collects every message that arrives within `window`.
    pub async fn drain_for(&mut self, window: Duration) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        let deadline = tokio::time::Instant::now() + window;
        while let Ok(Some(Ok(frame))) = tokio::time::timeout_at(deadline, self.ws.next()).await {
            if let Message::Text(text) = frame {
                messages.push(serde_json::from_str(&text).expect("decode frame"));
            }
        }
        messages
    }

    /// Waits until the server closes the connection.
    pub async fn expect_hangup(&mut self) -> Hangup {
        loop {
            let next = timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("server did not hang up");
            match next {
                Some(Ok(Message::Close(frame))) => return Hangup::Close(frame.map(|f| f.code)),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return Hangup::Ended,
            }
        }
    }

    /// Closes the connection from the client side.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
