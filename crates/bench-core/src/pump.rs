//! Pump run state, control events and the flow setpoint.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{DomainError, DomainResult};

/// Multiplier applied to the target flow to get the simulated flow ceiling.
pub const FLOW_HEADROOM: f64 = 1.1;

/// Largest accepted flow setpoint, far above any catalog pump.
///
/// Bounding the setpoint keeps the sampled flow and its two-decimal
/// rounding finite.
pub const MAX_TARGET_FLOW: f64 = 10_000.0;

// ============================================================================
// Pump State Machine
// ============================================================================

/// Run state of the simulated pump.
///
/// Serialized as `"off"` / `"on"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpState {
    /// Pump stopped (initial state)
    #[default]
    Off,

    /// Pump running
    On,
}

/// Control events that drive the pump state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PumpEvent {
    Start,
    Stop,
}

impl PumpState {
    /// Applies `event` to this state.
    ///
    /// Returns the new state, or `None` when the event does not change
    /// anything (starting a running pump, stopping a stopped one).
    #[must_use]
    pub fn transition(self, event: PumpEvent) -> Option<PumpState> {
        match (self, event) {
            (PumpState::Off, PumpEvent::Start) => Some(PumpState::On),
            (PumpState::On, PumpEvent::Stop) => Some(PumpState::Off),
            (PumpState::On, PumpEvent::Start) | (PumpState::Off, PumpEvent::Stop) => None,
        }
    }

    /// Returns true if the pump is running.
    pub fn is_running(self) -> bool {
        matches!(self, PumpState::On)
    }

    /// Returns the wire name of this state.
    pub fn as_str(self) -> &'static str {
        match self {
            PumpState::Off => "off",
            PumpState::On => "on",
        }
    }
}

impl fmt::Display for PumpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Target Flow
// ============================================================================

/// Operator flow setpoint.
///
/// Always within `0..=MAX_TARGET_FLOW`; construction rejects anything else
/// so the simulated flow range can never invert or overflow.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct TargetFlow(f64);

impl TargetFlow {
    /// Zero flow.
    pub const ZERO: TargetFlow = TargetFlow(0.0);

    /// Creates a validated target flow.
    ///
    /// # Errors
    ///
    /// `DomainError::InvalidTargetFlow` if `value` is NaN or outside
    /// `0..=MAX_TARGET_FLOW`.
    pub fn new(value: f64) -> DomainResult<Self> {
        if (0.0..=MAX_TARGET_FLOW).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidTargetFlow { value })
        }
    }

    /// Returns the raw setpoint.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Upper bound for simulated flow while running.
    pub fn ceiling(self) -> f64 {
        self.0 * FLOW_HEADROOM
    }
}

impl fmt::Display for TargetFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time copy of the pump control state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PumpSnapshot {
    pub state: PumpState,
    pub target_flow: TargetFlow,
}
