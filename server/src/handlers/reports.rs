use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use reportgen::{SubmitRequest, TaskStatusView};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
}

/// Accepts a report request. The task id comes back right away; the
/// report itself is built in the background.
pub async fn submit_report_handler(
    State(state): State<AppState>,
    Json(submission): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let task_id = state.service.submit(submission).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { task_id })))
}

pub async fn get_report_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusView>, ApiError> {
    match state.service.status(&task_id).await? {
        Some(view) => Ok(Json(view)),
        None => Err(ApiError::NotFound(task_id)),
    }
}
