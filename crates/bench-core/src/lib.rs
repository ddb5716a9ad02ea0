//! Bench Core - Shared types for the SIA test bench
//!
//! This crate provides the domain types shared between the wire
//! protocol (`bench-protocol`) and the daemon (`benchd`):
//! pump run state, the flow setpoint, telemetry samples and the
//! static pump catalog.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod catalog;
pub mod error;
pub mod pump;
pub mod telemetry;

// Re-exports for convenience
pub use catalog::{pump_catalog, PumpModel};
pub use error::{DomainError, DomainResult};
pub use pump::{PumpEvent, PumpSnapshot, PumpState, TargetFlow, FLOW_HEADROOM, MAX_TARGET_FLOW};
pub use telemetry::{SampleRanges, TelemetrySample};
