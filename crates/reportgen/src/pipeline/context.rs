use serde::{Deserialize, Serialize};

use crate::report::request::{DeliveryMethod, ReportRequest};
use crate::storage::StoredReport;

pub struct PipelineContext {
    // Input
    pub task_id: String,
    pub request: ReportRequest,

    // Set by validate
    pub dropped_columns: Vec<String>,

    // Set by extract
    pub row_count: Option<usize>,

    // Set by encode
    pub file_name: Option<String>,

    // Set by upload
    pub stored: Option<StoredReport>,
}

impl PipelineContext {
    pub fn new(task_id: impl Into<String>, request: ReportRequest) -> Self {
        Self {
            task_id: task_id.into(),
            request,
            dropped_columns: Vec::new(),
            row_count: None,
            file_name: None,
            stored: None,
        }
    }
}

/// What a successful job persists in `user_tasks.result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOutcome {
    pub file_url: String,
    pub object_key: String,
    pub bucket: String,
    pub file_name: String,
    pub row_count: usize,
    pub delivery_method: DeliveryMethod,
    pub dropped_columns: Vec<String>,
}

impl ReportOutcome {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "file_url": self.file_url,
            "object_key": self.object_key,
            "bucket": self.bucket,
            "file_name": self.file_name,
            "row_count": self.row_count,
            "delivery_method": self.delivery_method,
            "dropped_columns": self.dropped_columns,
        })
    }
}
