//! Connection registry for telemetry subscribers.
//!
//! The registry owns the set of open WebSocket subscribers and fans
//! messages out to all of them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  add / remove   ┌──────────────────────────────┐
//! │ConnectionHandler│────────────────▶│     ConnectionRegistry       │
//! │  (per client)   │                 │ RwLock<HashMap<Id, Sub>>     │
//! └────────▲────────┘                 └──────────────┬───────────────┘
//!          │ mpsc (Arc<str> frames)                  │ broadcast
//!          └─────────────────────────────────────────┘
//! ```
//!
//! Broadcasts hold the read lock for the delivery pass and collect failed
//! subscribers; removals are applied afterwards under the write lock.
//! Delivery never waits: a subscriber whose queue is full has stopped
//! draining and is evicted like a closed one.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Serialization and delivery failures are logged, never propagated as panics

mod subscriber;

pub use subscriber::{DeliveryError, Payload, Subscriber, SubscriberId, OUTBOUND_BUFFER};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use bench_protocol::ServerMessage;

/// Default maximum number of concurrent subscribers.
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 100;

/// Outcome of one broadcast pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers the frame was queued for
    pub delivered: usize,

    /// Subscribers dropped because delivery failed
    pub removed: usize,
}

/// Registry of open telemetry subscribers.
pub struct ConnectionRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
    max_subscribers: usize,
}

impl ConnectionRegistry {
    /// Creates an empty registry accepting up to `max_subscribers`.
    pub fn new(max_subscribers: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_subscribers,
        }
    }

    /// Allocates a fresh subscriber ID.
    pub fn next_id(&self) -> SubscriberId {
        SubscriberId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocates an ID and builds a subscriber channel for it.
    pub fn new_subscriber(&self) -> (Subscriber, tokio::sync::mpsc::Receiver<Payload>) {
        Subscriber::channel(self.next_id())
    }

    /// Registers `subscriber` and queues `greeting` to it.
    ///
    /// The greeting is queued while the write lock is held, so it is always
    /// the first frame the subscriber sees; no broadcast can slip in ahead.
    ///
    /// # Errors
    ///
    /// - `RegistryError::TooManySubscribers` at capacity
    /// - `RegistryError::Serialize` if the greeting cannot be encoded
    /// - `RegistryError::Delivery` if the greeting cannot be queued
    pub async fn add(
        &self,
        subscriber: Subscriber,
        greeting: &ServerMessage,
    ) -> Result<(), RegistryError> {
        let payload = encode(greeting)?;
        let mut subs = self.subscribers.write().await;

        if subs.len() >= self.max_subscribers && !subs.contains_key(&subscriber.id()) {
            warn!(
                subscriber = %subscriber.id(),
                max = self.max_subscribers,
                "Registry full, rejecting subscriber"
            );
            return Err(RegistryError::TooManySubscribers {
                max: self.max_subscribers,
            });
        }

        subscriber
            .deliver(payload)
            .map_err(|error| RegistryError::Delivery {
                id: subscriber.id(),
                error,
            })?;

        let id = subscriber.id();
        subs.insert(id, subscriber);
        info!(subscriber = %id, total = subs.len(), "Subscriber connected");

        Ok(())
    }

    /// Unregisters a subscriber.
    ///
    /// Idempotent: returns false if it was not registered.
    pub async fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(&id);
        match removed {
            Some(sub) => {
                sub.close();
                info!(subscriber = %id, "Subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Sends `message` to every registered subscriber.
    ///
    /// The message is serialized once. Subscribers whose delivery fails
    /// (closed or queue full) are collected during the pass and removed
    /// afterwards. With no subscribers this returns immediately without
    /// serializing.
    pub async fn broadcast(&self, message: &ServerMessage) -> BroadcastReport {
        let subs = self.subscribers.read().await;
        if subs.is_empty() {
            return BroadcastReport::default();
        }

        let payload = match encode(message) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, kind = message.kind(), "Failed to serialize broadcast");
                return BroadcastReport::default();
            }
        };

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();

        for (id, sub) in subs.iter() {
            match sub.deliver(Arc::clone(&payload)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(subscriber = %id, error = %e, "Failed to deliver to subscriber");
                    failed.push(*id);
                }
            }
        }

        // Release the read lock before taking the write lock
        drop(subs);

        if !failed.is_empty() {
            let mut subs = self.subscribers.write().await;
            for id in failed {
                if let Some(sub) = subs.remove(&id) {
                    sub.close();
                    report.removed += 1;
                    debug!(subscriber = %id, "Removed failed subscriber");
                }
            }
        }

        report
    }

    /// Removes and closes every subscriber. Returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let mut subs = self.subscribers.write().await;
        let count = subs.len();
        for (_, sub) in subs.drain() {
            sub.close();
        }
        count
    }

    /// Returns the number of registered subscribers.
    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Returns true if no subscribers are registered.
    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }

    /// Returns true if `id` is registered.
    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().await.contains_key(&id)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SUBSCRIBERS)
    }
}

/// Serializes a server message into a shareable frame.
pub fn encode(message: &ServerMessage) -> Result<Payload, RegistryError> {
    serde_json::to_string(message)
        .map(Payload::from)
        .map_err(|e| RegistryError::Serialize(e.to_string()))
}

/// Errors that can occur in registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Too many subscribers (max: {max})")]
    TooManySubscribers { max: usize },

    #[error("Failed to deliver to {id}: {error}")]
    Delivery { id: SubscriberId, error: DeliveryError },

    #[error("Failed to serialize message: {0}")]
    Serialize(String),
}
