use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tracing::error;

use crate::dto::{ChatRequest, ChatResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Single-turn chat proxy. Upstream failures come back as a readable
/// message in the response body rather than an HTTP error, so the
/// dashboard can show them inline.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.model.is_empty() || req.message.is_empty() {
        return Err(AppError::BadRequest(
            "Model and message are required".to_string(),
        ));
    }

    let response = match state.ollama.chat(&req.model, &req.message).await {
        Ok(content) => content,
        Err(e) => {
            error!("chat failed: {e}");
            format!("Error: {e}")
        }
    };
    Ok(Json(ChatResponse { response }))
}
