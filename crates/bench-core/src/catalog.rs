//! Static pump catalog served by `GET /api/pumps`.

use serde::Serialize;

/// Reference data for one pump model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpModel {
    pub id: &'static str,
    pub name: &'static str,
    pub model: &'static str,
    #[serde(rename = "maxRPM")]
    pub max_rpm: u32,
    pub max_flow_rate: u32,
    pub max_pressure: u32,
    pub current_draw: f64,
    pub stroke_length: f64,
}

const CATALOG: [PumpModel; 3] = [
    PumpModel {
        id: "1",
        name: "SIA Pump Model A",
        model: "Model A",
        max_rpm: 3000,
        max_flow_rate: 50,
        max_pressure: 100,
        current_draw: 5.5,
        stroke_length: 2.5,
    },
    PumpModel {
        id: "2",
        name: "SIA Pump Model B",
        model: "Model B",
        max_rpm: 3500,
        max_flow_rate: 75,
        max_pressure: 120,
        current_draw: 7.2,
        stroke_length: 3.0,
    },
    PumpModel {
        id: "3",
        name: "SIA Pump Model C",
        model: "Model C",
        max_rpm: 4000,
        max_flow_rate: 100,
        max_pressure: 150,
        current_draw: 9.5,
        stroke_length: 3.5,
    },
];

/// Returns the fixed list of supported pump models.
pub fn pump_catalog() -> &'static [PumpModel] {
    &CATALOG
}
