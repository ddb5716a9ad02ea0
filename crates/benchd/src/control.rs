//! Pump control state.
//!
//! `PumpControl` is the single owner of the pump run state and flow
//! setpoint. Start/stop transitions broadcast a state message through the
//! connection registry; all other components only read snapshots.
//!
//! Lock order is always control, then registry. Transitions broadcast
//! while holding the control lock, and `attach` registers new subscribers
//! under the same lock, so a subscriber either sees a transition in its
//! greeting or receives the broadcast for it.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use bench_core::{DomainResult, PumpEvent, PumpSnapshot, PumpState, TargetFlow};
use bench_protocol::ServerMessage;

use crate::registry::{ConnectionRegistry, RegistryError, Subscriber};

/// Owner of the pump run state and target flow.
pub struct PumpControl {
    snapshot: Mutex<PumpSnapshot>,
    registry: Arc<ConnectionRegistry>,
}

impl PumpControl {
    /// Creates a stopped pump with zero target flow.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            snapshot: Mutex::new(PumpSnapshot::default()),
            registry,
        }
    }

    /// Returns the registry this controller broadcasts to.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Starts the pump. No-op if already running.
    pub async fn start(&self) -> PumpState {
        self.apply(PumpEvent::Start).await
    }

    /// Stops the pump. No-op if already stopped.
    pub async fn stop(&self) -> PumpState {
        self.apply(PumpEvent::Stop).await
    }

    /// Applies a control event and returns the resulting state.
    ///
    /// A state message is broadcast only when the state actually changes.
    pub async fn apply(&self, event: PumpEvent) -> PumpState {
        let mut snapshot = self.snapshot.lock().await;

        let Some(next) = snapshot.state.transition(event) else {
            debug!(state = %snapshot.state, event = ?event, "Pump event ignored");
            return snapshot.state;
        };

        snapshot.state = next;
        info!(state = %next, target_flow = %snapshot.target_flow, "Pump state changed");

        let report = self.registry.broadcast(&ServerMessage::state(next)).await;
        debug!(
            delivered = report.delivered,
            removed = report.removed,
            "State broadcast complete"
        );

        next
    }

    /// Sets the flow setpoint.
    ///
    /// # Errors
    ///
    /// `DomainError::InvalidTargetFlow` for values outside
    /// `0..=MAX_TARGET_FLOW` (or NaN); the current setpoint is left unchanged.
    pub async fn set_target_flow(&self, value: f64) -> DomainResult<TargetFlow> {
        let target = TargetFlow::new(value).inspect_err(|e| {
            warn!(value, error = %e, "Rejected target flow");
        })?;

        self.snapshot.lock().await.target_flow = target;
        info!(target_flow = %target, "Target flow set");

        Ok(target)
    }

    /// Returns a copy of the current state and setpoint.
    pub async fn snapshot(&self) -> PumpSnapshot {
        *self.snapshot.lock().await
    }

    /// Returns the current run state.
    pub async fn state(&self) -> PumpState {
        self.snapshot.lock().await.state
    }

    /// Registers `subscriber` with the current state as its greeting.
    ///
    /// # Errors
    ///
    /// Propagates `RegistryError` from [`ConnectionRegistry::add`].
    pub async fn attach(&self, subscriber: Subscriber) -> Result<(), RegistryError> {
        let snapshot = self.snapshot.lock().await;
        self.registry
            .add(subscriber, &ServerMessage::state(snapshot.state))
            .await
    }
}
