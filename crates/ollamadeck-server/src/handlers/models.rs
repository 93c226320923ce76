use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::dto::{DeleteRequest, InstallRequest, MessageResponse, ModelsResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Installed models, force-refreshed past the cache. Refresh failures fall
/// back inside the cache, so this never errors.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let models = state.cache.get(&state.ollama, true).await;
    Json(ModelsResponse { models })
}

/// The bundled catalog of models offered for installation.
pub async fn available(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let path = &state.config.models_file;
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!("models catalog not found at {}", path.display());
            return Err(AppError::NotFound("Models list not found".to_string()));
        }
        Err(e) => return Err(AppError::Internal(e.to_string())),
    };

    let catalog: serde_json::Value =
        serde_json::from_str(&contents).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(catalog))
}

pub async fn install(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InstallRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if req.model.is_empty() {
        return Err(AppError::BadRequest("Model name is required".to_string()));
    }

    let message = state
        .installer
        .clone()
        .begin_install(state.ollama.clone(), req.model);
    Ok(Json(MessageResponse { message }))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if req.model.is_empty() {
        return Err(AppError::BadRequest("Model name is required".to_string()));
    }

    let message = match state.ollama.delete_model(&req.model).await {
        Ok(()) => format!("Successfully deleted {}", req.model),
        Err(e) => {
            error!("delete failed: {e}");
            format!("Failed to delete {}: {e}", req.model)
        }
    };
    Ok(Json(MessageResponse { message }))
}

/// Poll the install tracker. Idle snapshots are cacheable to soften the
/// dashboard's polling; active ones must never be cached.
pub async fn progress(State(state): State<Arc<AppState>>) -> Response {
    let report = state.installer.report();
    let cache_control = if report.is_active() {
        "no-cache, no-store, must-revalidate"
    } else {
        "max-age=10"
    };
    ([(header::CACHE_CONTROL, cache_control)], Json(report)).into_response()
}
