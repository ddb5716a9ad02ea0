//! Bench Protocol - Wire protocol for the telemetry socket
//!
//! This crate provides the JSON message types exchanged between the
//! daemon and browser/test clients over the `/ws` WebSocket, and the
//! tolerant parser used for inbound client messages.

pub mod message;
pub mod parse;

pub use message::{ClientMessage, ControlCommand, ServerMessage};
pub use parse::{parse_client_message, ProtocolError};
