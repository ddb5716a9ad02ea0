//! Subscriber handles for open telemetry connections.
//!
//! A `Subscriber` is the registry's view of one WebSocket client: a bounded
//! outbound queue drained by the connection's socket writer, plus a
//! cancellation token acting as the liveness flag. Cancelling the token
//! tells the owning connection to close.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Outbound queue depth per subscriber (~32 s of telemetry at 500 ms).
///
/// A subscriber whose queue is still full when the next frame arrives has
/// stopped draining and is dropped.
pub const OUTBOUND_BUFFER: usize = 64;

/// Serialized frame shared between all recipients of a broadcast.
pub type Payload = Arc<str>;

/// Unique identifier for a subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Handle for delivering frames to one connected client.
///
/// Cheap to clone; the registry holds one clone and the connection
/// handler another.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<Payload>,
    closed: CancellationToken,
}

impl Subscriber {
    /// Creates a subscriber and the receiving end of its outbound queue.
    pub fn channel(id: SubscriberId) -> (Self, mpsc::Receiver<Payload>) {
        let (sender, receiver) = mpsc::channel(OUTBOUND_BUFFER);
        let subscriber = Self {
            id,
            sender,
            closed: CancellationToken::new(),
        };
        (subscriber, receiver)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Returns true until the subscriber is closed or its queue is dropped.
    pub fn is_alive(&self) -> bool {
        !self.closed.is_cancelled() && !self.sender.is_closed()
    }

    /// Marks the subscriber as closed.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Resolves once the subscriber has been closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Queues a frame without waiting.
    ///
    /// Never blocks: a full queue is reported as [`DeliveryError::Full`].
    pub fn deliver(&self, payload: Payload) -> Result<(), DeliveryError> {
        if self.closed.is_cancelled() {
            return Err(DeliveryError::Closed);
        }

        self.sender.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Reasons a frame could not be queued for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Subscriber closed")]
    Closed,

    #[error("Subscriber queue full")]
    Full,
}
