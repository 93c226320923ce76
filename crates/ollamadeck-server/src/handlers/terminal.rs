use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use ollamadeck_core::CommandRecord;

use crate::dto::{ExecuteRequest, OutputResponse};
use crate::error::AppError;
use crate::state::AppState;

pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Json<OutputResponse>, AppError> {
    if req.command.is_empty() {
        return Err(AppError::BadRequest("Command is required".to_string()));
    }

    let output = state.terminal.execute(&req.command).await;
    Ok(Json(OutputResponse { output }))
}

pub async fn history(State(state): State<Arc<AppState>>) -> Json<Vec<CommandRecord>> {
    Json(state.terminal.history())
}
