//! Synthetic sensor readings for the simulated pump.
//!
//! Readings are drawn uniformly from per-state ranges and rounded to
//! two decimal places. While the pump is off the flow range collapses to
//! exactly zero; while it runs the flow ceiling follows the target flow.

use std::ops::RangeInclusive;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::pump::{PumpSnapshot, PumpState};

/// Sampling ranges for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRanges {
    pub pressure: RangeInclusive<f64>,
    pub flow_rate: RangeInclusive<f64>,
    pub temperature: RangeInclusive<f64>,
    pub voltage: RangeInclusive<f64>,
    pub current: RangeInclusive<f64>,
}

impl SampleRanges {
    /// Returns the ranges that apply to `snapshot`.
    pub fn for_snapshot(snapshot: &PumpSnapshot) -> Self {
        match snapshot.state {
            PumpState::On => Self {
                pressure: 20.0..=100.0,
                flow_rate: 0.0..=snapshot.target_flow.ceiling(),
                temperature: 65.0..=85.0,
                voltage: 110.0..=120.0,
                current: 3.0..=10.0,
            },
            PumpState::Off => Self {
                pressure: 0.0..=5.0,
                flow_rate: 0.0..=0.0,
                temperature: 65.0..=75.0,
                voltage: 110.0..=120.0,
                current: 0.0..=0.5,
            },
        }
    }
}

/// One telemetry reading, as broadcast to subscribers.
///
/// Field names are camelCase on the wire (`flowRate`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    /// Unix time in milliseconds
    pub timestamp: i64,
    pub pressure: f64,
    pub flow_rate: f64,
    pub temperature: f64,
    pub voltage: f64,
    pub current: f64,
}

impl TelemetrySample {
    /// Draws a fresh sample for the given pump snapshot.
    pub fn generate<R: Rng + ?Sized>(snapshot: &PumpSnapshot, timestamp: i64, rng: &mut R) -> Self {
        let ranges = SampleRanges::for_snapshot(snapshot);

        Self {
            timestamp,
            pressure: sample(rng, &ranges.pressure),
            flow_rate: sample(rng, &ranges.flow_rate),
            temperature: sample(rng, &ranges.temperature),
            voltage: sample(rng, &ranges.voltage),
            current: sample(rng, &ranges.current),
        }
    }
}

/// Draws a value from `range` rounded to two decimals.
///
/// The rounded value is pulled back inside the range so rounding can
/// never push a reading past its ceiling.
fn sample<R: Rng + ?Sized>(rng: &mut R, range: &RangeInclusive<f64>) -> f64 {
    let (low, high) = (*range.start(), *range.end());
    if high <= low {
        return low;
    }

    let rounded = round2(rng.gen_range(low..=high));
    let floor = (low * 100.0).ceil() / 100.0;
    let ceiling = (high * 100.0).floor() / 100.0;
    rounded.max(floor).min(ceiling)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
