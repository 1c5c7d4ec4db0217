//! Database error types.

use sea_orm::DbErr;
use thiserror::Error;

/// Errors from task persistence.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error reported by SeaORM or the driver underneath.
    #[error("Database error: {0}")]
    Db(#[from] DbErr),

    /// The request payload could not be stored as JSON.
    #[error("Failed to serialize task payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    /// A terminal status was already written; terminal states are final.
    #[error("Task '{task_id}' already finished with status {status}")]
    TaskAlreadyFinished { task_id: String, status: String },

    #[error("Unknown task status '{0}'")]
    InvalidStatus(String),
}
