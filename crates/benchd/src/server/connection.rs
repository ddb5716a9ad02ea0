//! WebSocket connection handler for telemetry subscribers.
//!
//! Each `/ws` upgrade gets its own `ConnectionHandler` that:
//! - Registers a subscriber (receiving the current state first)
//! - Forwards queued broadcast frames to the socket
//! - Routes inbound text frames through the command gateway
//! - Unregisters on disconnect, send failure or shutdown
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Bad frames are logged and dropped; they never close the connection

use std::borrow::Cow;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use super::AppState;

/// Maximum inbound message size (1 MB)
pub const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// How long a closing handshake may wait on a client that stopped reading.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a connection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    /// Client sent a close frame or the stream ended
    ClientClosed,

    /// Registry dropped the subscriber after a failed delivery
    Evicted,

    /// Server is shutting down
    Shutdown,

    /// Socket read or write failed
    SocketError,
}

/// Upgrades `GET /ws` into a telemetry subscriber connection.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| ConnectionHandler::new(socket, state).run())
}

/// Connection handler for a single WebSocket client.
pub struct ConnectionHandler {
    socket: WebSocket,
    state: AppState,
}

impl ConnectionHandler {
    pub fn new(socket: WebSocket, state: AppState) -> Self {
        Self { socket, state }
    }

    /// Runs the connection until the client leaves or the server stops.
    pub async fn run(self) {
        let Self { socket, state } = self;
        let registry = state.control.registry();
        let (subscriber, mut outbound) = registry.new_subscriber();
        let id = subscriber.id();
        let (mut sink, mut stream) = socket.split();

        if let Err(e) = state.control.attach(subscriber.clone()).await {
            warn!(subscriber = %id, error = %e, "Rejecting connection");
            send_close(&mut sink, close_code::AGAIN, e.to_string()).await;
            return;
        }

        let reason = loop {
            tokio::select! {
                biased;

                _ = state.cancel_token.cancelled() => break Disconnect::Shutdown,

                _ = subscriber.closed() => break Disconnect::Evicted,

                // A client that stops reading stalls this write; eviction
                // and shutdown still end the loop.
                Some(payload) = outbound.recv() => {
                    let write = sink.send(Message::Text(payload.to_string()));
                    tokio::select! {
                        biased;

                        _ = state.cancel_token.cancelled() => break Disconnect::Shutdown,

                        _ = subscriber.closed() => break Disconnect::Evicted,

                        result = write => if let Err(e) = result {
                            debug!(subscriber = %id, error = %e, "Failed to write frame");
                            break Disconnect::SocketError;
                        },
                    }
                }

                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        state.gateway.handle_text(&text, &subscriber).await;
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        debug!(subscriber = %id, len = bytes.len(), "Ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break Disconnect::ClientClosed,
                    // Ping/pong are answered by axum
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(subscriber = %id, error = %e, "WebSocket read error");
                        break Disconnect::SocketError;
                    }
                },
            }
        };

        registry.remove(id).await;

        if matches!(reason, Disconnect::Shutdown | Disconnect::Evicted) {
            send_close(&mut sink, close_code::AWAY, "server closing connection").await;
        }

        info!(subscriber = %id, reason = ?reason, "Client disconnected");
    }
}

/// Sends a close frame, giving up after [`CLOSE_TIMEOUT`].
async fn send_close(
    sink: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: impl Into<Cow<'static, str>>,
) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };

    match tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Message::Close(Some(frame)))).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Failed to send close frame"),
        Err(_) => debug!("Timed out sending close frame"),
    }
}
