use axum::{
    extract::{Query, State},
    Json,
};
use reportgen::{TaskPage, TaskQuery};

use super::ApiError;
use crate::state::AppState;

/// `GET /api/tasks?organizationId=..&businessUnitId=..[&status][&limit][&offset]`
pub async fn list_tasks_handler(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<TaskPage>, ApiError> {
    Ok(Json(state.service.list(query).await?))
}
