//! HTTP handlers, grouped by resource:
//! - `reports`: submission and status polling
//! - `tasks`: tenant task listing
//! - `health`: liveness

pub mod health;
pub mod reports;
pub mod tasks;

pub use health::health_handler;
pub use reports::{get_report_handler, submit_report_handler};
pub use tasks::list_tasks_handler;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reportgen::{DatabaseError, SubmitError};
use serde::Serialize;
use tracing::{error, warn};

/// Error body: `{error, message}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Submit(SubmitError),
    NotFound(String),
    Database(DatabaseError),
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        ApiError::Submit(e)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        ApiError::Database(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Submit(SubmitError::InvalidDeliveryMethod(method)) => {
                warn!(delivery_method = %method, "Rejected report request");
                (
                    StatusCode::BAD_REQUEST,
                    "InvalidDeliveryMethod",
                    format!("Invalid delivery method: {}", method),
                )
            }
            ApiError::Submit(SubmitError::InvalidRequest(message)) => {
                warn!(error = %message, "Rejected report request");
                (StatusCode::BAD_REQUEST, "InvalidRequest", message)
            }
            ApiError::Submit(SubmitError::ShuttingDown) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "ShuttingDown",
                "Report service is shutting down".to_string(),
            ),
            ApiError::Submit(SubmitError::Database(e)) | ApiError::Database(e) => {
                error!(error = %e, "Task store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DatabaseError",
                    "Task store unavailable".to_string(),
                )
            }
            ApiError::NotFound(task_id) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                format!("Task {} not found", task_id),
            ),
        };

        (status, Json(ErrorBody { error, message })).into_response()
    }
}
