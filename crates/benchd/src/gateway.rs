//! Command gateway for inbound subscriber messages.
//!
//! Decodes text frames from a subscriber and routes them to
//! [`PumpControl`]. Nothing here can fail a connection: unknown messages
//! are dropped at debug level, malformed ones at warn level.

use std::sync::Arc;

use tracing::{debug, warn};

use bench_core::{DomainError, PumpState};
use bench_protocol::{parse_client_message, ClientMessage, ControlCommand, ProtocolError, ServerMessage};

use crate::control::PumpControl;
use crate::registry::{encode, Subscriber};

/// What the gateway did with one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    /// A start/stop command was applied; carries the resulting state
    StateApplied(PumpState),

    /// Target flow updated
    TargetFlowSet(f64),

    /// Target flow rejected by validation
    TargetFlowRejected(DomainError),

    /// Current state sent to the requesting subscriber
    StateSent(PumpState),

    /// State reply could not be queued
    ReplyFailed(String),

    /// Well-formed but unknown message kind
    Ignored(ProtocolError),

    /// Payload could not be decoded
    Malformed(ProtocolError),
}

/// Routes subscriber messages to the pump controller.
#[derive(Clone)]
pub struct CommandGateway {
    control: Arc<PumpControl>,
}

impl CommandGateway {
    pub fn new(control: Arc<PumpControl>) -> Self {
        Self { control }
    }

    /// Handles one text frame received from `from`.
    pub async fn handle_text(&self, text: &str, from: &Subscriber) -> GatewayOutcome {
        match parse_client_message(text) {
            Ok(msg) => self.handle_message(msg, from).await,
            Err(e) if e.is_unrecognized() => {
                debug!(subscriber = %from.id(), error = %e, "Ignoring unknown message");
                GatewayOutcome::Ignored(e)
            }
            Err(e) => {
                warn!(subscriber = %from.id(), error = %e, "Discarding malformed message");
                GatewayOutcome::Malformed(e)
            }
        }
    }

    /// Handles a decoded client message.
    pub async fn handle_message(&self, msg: ClientMessage, from: &Subscriber) -> GatewayOutcome {
        match msg {
            ClientMessage::Control(ControlCommand::Start) => {
                GatewayOutcome::StateApplied(self.control.start().await)
            }
            ClientMessage::Control(ControlCommand::Stop) => {
                GatewayOutcome::StateApplied(self.control.stop().await)
            }
            ClientMessage::Control(ControlCommand::SetTargetFlow { value }) => {
                match self.control.set_target_flow(value).await {
                    Ok(target) => GatewayOutcome::TargetFlowSet(target.value()),
                    Err(e) => GatewayOutcome::TargetFlowRejected(e),
                }
            }
            ClientMessage::GetState => self.reply_state(from).await,
        }
    }

    /// Sends the current state to `to` only.
    async fn reply_state(&self, to: &Subscriber) -> GatewayOutcome {
        let state = self.control.state().await;
        let result = match encode(&ServerMessage::state(state)) {
            Ok(payload) => to.deliver(payload).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(()) => GatewayOutcome::StateSent(state),
            Err(e) => {
                debug!(subscriber = %to.id(), error = %e, "Failed to send state reply");
                GatewayOutcome::ReplyFailed(e)
            }
        }
    }
}
