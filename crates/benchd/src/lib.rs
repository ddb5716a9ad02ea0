//! SIA test bench daemon - pump control and telemetry broadcast server
//!
//! This crate provides the server side of the test bench:
//! - `config` - Bind address, tick period and capacity settings
//! - `registry` - Set of open WebSocket subscribers and fan-out
//! - `control` - Shared pump state (on/off plus target flow)
//! - `gateway` - Interprets inbound client commands
//! - `telemetry` - Periodic sample generator
//! - `server` - axum router, WebSocket handler and HTTP API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        benchd                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   BenchServer   │────▶│        PumpControl          │   │
//! │  │  (axum, TCP)    │     │  (pump state owner)         │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ state changes     │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│◀────│    ConnectionRegistry       │   │
//! │  │  (per client)   │     │    (fan-out)                │◀──┤
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                      TelemetryTask ─────────┘
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod control;
pub mod gateway;
pub mod registry;
pub mod server;
pub mod telemetry;
