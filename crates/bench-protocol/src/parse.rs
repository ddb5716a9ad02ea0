//! Parsing of inbound client messages.
//!
//! Messages are decoded field by field so an unknown `type` or `command`
//! ([`ProtocolError::is_unrecognized`]) is distinguishable from a broken
//! payload.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::message::{ClientMessage, ControlCommand};

/// Errors produced while decoding a client message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Expected a JSON object")]
    NotAnObject,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Unknown control command: {0}")]
    UnknownCommand(String),
}

impl ProtocolError {
    /// True for well-formed messages this daemon does not understand.
    ///
    /// These are ignored at debug level; everything else is a malformed
    /// payload.
    pub fn is_unrecognized(&self) -> bool {
        matches!(
            self,
            ProtocolError::UnknownType(_) | ProtocolError::UnknownCommand(_)
        )
    }
}

/// Decodes one text frame into a [`ClientMessage`].
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;

    match required_str(object, "type")? {
        "control" => parse_control(object).map(ClientMessage::Control),
        "get_state" => Ok(ClientMessage::GetState),
        other => Err(ProtocolError::UnknownType(other.to_string())),
    }
}

fn parse_control(object: &Map<String, Value>) -> Result<ControlCommand, ProtocolError> {
    match required_str(object, "command")? {
        "start" => Ok(ControlCommand::Start),
        "stop" => Ok(ControlCommand::Stop),
        "set_target_flow" => {
            let value = object
                .get("value")
                .ok_or(ProtocolError::MissingField("value"))?;
            let value = value.as_f64().ok_or_else(|| ProtocolError::InvalidField {
                field: "value",
                reason: format!("expected a number, got {value}"),
            })?;
            Ok(ControlCommand::SetTargetFlow { value })
        }
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

fn required_str<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ProtocolError> {
    let value = object.get(field).ok_or(ProtocolError::MissingField(field))?;
    value.as_str().ok_or_else(|| ProtocolError::InvalidField {
        field,
        reason: format!("expected a string, got {value}"),
    })
}
