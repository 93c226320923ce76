pub mod chat;
pub mod models;
pub mod system;
pub mod terminal;

use axum::Json;

use crate::dto::HealthResponse;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
