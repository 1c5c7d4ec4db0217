//! HTTP surface for reportgen:
//! - `POST /api/reports` submits a report request
//! - `GET /api/reports/:task_id` polls a task
//! - `GET /api/tasks` lists a tenant's tasks
//! - `GET /health`

pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub use state::AppState;

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/reports", post(handlers::submit_report_handler))
        .route("/api/reports/:task_id", get(handlers::get_report_handler))
        .route("/api/tasks", get(handlers::list_tasks_handler))
        .route("/health", get(handlers::health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}
