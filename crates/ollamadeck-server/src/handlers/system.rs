use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use ollamadeck_services::HardwareReport;

use crate::state::AppState;

pub async fn gpu(State(state): State<Arc<AppState>>) -> Json<HardwareReport> {
    Json(state.hardware.report().await)
}
