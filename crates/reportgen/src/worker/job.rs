use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::entities::user_task;
use crate::db::{DatabaseError, TaskFilter, TaskStatus};
use crate::report::request::ReportRequest;

/// One accepted report request and its task identifier.
#[derive(Debug, Clone)]
pub struct ReportJob {
    pub task_id: String,
    pub request: ReportRequest,
}

impl ReportJob {
    /// Assigns a fresh UUIDv4 task id.
    pub fn new(request: ReportRequest) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            request,
        }
    }
}

/// Polling view of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusView {
    pub task_id: String,
    pub task_status: TaskStatus,
    pub task_result: Option<serde_json::Value>,
    pub task_error: Option<serde_json::Value>,
}

impl TryFrom<user_task::Model> for TaskStatusView {
    type Error = DatabaseError;

    fn try_from(row: user_task::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            task_status: row.task_status()?,
            task_id: row.task_id,
            task_result: row.result,
            task_error: row.error,
        })
    }
}

/// Listing entry; adds what the task was for and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub task_status: TaskStatus,
    pub table_name: Option<String>,
    pub file_format: Option<String>,
    pub user_id: Option<String>,
    pub task_result: Option<serde_json::Value>,
    pub task_error: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<user_task::Model> for TaskSummary {
    type Error = DatabaseError;

    fn try_from(row: user_task::Model) -> Result<Self, Self::Error> {
        let payload_str = |key: &str| {
            row.payload
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        Ok(Self {
            task_status: row.task_status()?,
            table_name: payload_str("tableName"),
            file_format: payload_str("fileFormat"),
            task_id: row.task_id,
            user_id: row.user_id,
            task_result: row.result,
            task_error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Listing parameters as they arrive from clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub organization_id: String,
    pub business_unit_id: String,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

impl From<TaskQuery> for TaskFilter {
    fn from(query: TaskQuery) -> Self {
        Self {
            organization_id: query.organization_id,
            business_unit_id: query.business_unit_id,
            status: query.status,
            limit: query.limit,
            offset: query.offset,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<TaskSummary>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}
