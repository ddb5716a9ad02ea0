//! HTTP API routes.
//!
//! - `GET  /api/pumps`      - the static pump model catalog
//! - `POST /api/pump/start` - start the pump, broadcasting the new state
//! - `POST /api/pump/stop`  - stop the pump, broadcasting the new state

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use bench_core::{pump_catalog, PumpModel, PumpState};

use super::AppState;

/// Body returned by the start/stop endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub status: String,
    pub state: PumpState,
}

impl ControlResponse {
    fn success(state: PumpState) -> Self {
        Self {
            status: "success".to_string(),
            state,
        }
    }
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/pumps", get(list_pumps))
        .route("/api/pump/start", post(start_pump))
        .route("/api/pump/stop", post(stop_pump))
}

async fn list_pumps() -> Json<&'static [PumpModel]> {
    Json(pump_catalog())
}

async fn start_pump(State(state): State<AppState>) -> Json<ControlResponse> {
    let new_state = state.control.start().await;
    info!(state = %new_state, "Pump start requested over HTTP");
    Json(ControlResponse::success(new_state))
}

async fn stop_pump(State(state): State<AppState>) -> Json<ControlResponse> {
    let new_state = state.control.stop().await;
    info!(state = %new_state, "Pump stop requested over HTTP");
    Json(ControlResponse::success(new_state))
}
