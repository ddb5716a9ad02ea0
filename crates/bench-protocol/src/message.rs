//! Protocol message types for the telemetry socket.

use bench_core::{PumpState, TelemetrySample};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Pump control commands carried by `{"type": "control"}` messages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    /// Start the pump
    Start,

    /// Stop the pump
    Stop,

    /// Change the flow setpoint (validated by the receiver)
    SetTargetFlow { value: f64 },
}

impl ControlCommand {
    /// Returns the wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            ControlCommand::Start => "start",
            ControlCommand::Stop => "stop",
            ControlCommand::SetTargetFlow { .. } => "set_target_flow",
        }
    }
}

/// Messages sent from clients to the daemon.
///
/// Inbound text is decoded with [`crate::parse_client_message`], which
/// separates unknown message kinds from malformed payloads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientMessage {
    /// `{"type": "control", "command": ...}`
    Control(ControlCommand),

    /// `{"type": "get_state"}`
    GetState,
}

impl ClientMessage {
    /// Creates a start command.
    pub fn start() -> Self {
        Self::Control(ControlCommand::Start)
    }

    /// Creates a stop command.
    pub fn stop() -> Self {
        Self::Control(ControlCommand::Stop)
    }

    /// Creates a set-target-flow command.
    pub fn set_target_flow(value: f64) -> Self {
        Self::Control(ControlCommand::SetTargetFlow { value })
    }

    /// Creates a state request.
    pub fn get_state() -> Self {
        Self::GetState
    }

    /// Encodes the message in its wire shape.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            ClientMessage::Control(ControlCommand::SetTargetFlow { value }) => json!({
                "type": "control",
                "command": "set_target_flow",
                "value": value,
            }),
            ClientMessage::Control(command) => json!({
                "type": "control",
                "command": command.name(),
            }),
            ClientMessage::GetState => json!({ "type": "get_state" }),
        }
    }
}

/// Messages sent from the daemon to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current pump state (on connect, on request, on every transition)
    State {
        state: PumpState,
    },

    /// Periodic telemetry reading
    Data(TelemetrySample),
}

impl ServerMessage {
    /// Creates a state message.
    pub fn state(state: PumpState) -> Self {
        Self::State { state }
    }

    /// Creates a telemetry message.
    pub fn data(sample: TelemetrySample) -> Self {
        Self::Data(sample)
    }

    /// Returns the wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::State { .. } => "state",
            ServerMessage::Data(_) => "data",
        }
    }
}
