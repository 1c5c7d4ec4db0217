//! Background execution of report jobs.

pub mod job;
pub mod service;

pub use job::{ReportJob, TaskPage, TaskQuery, TaskStatusView, TaskSummary};
pub use service::{ReportService, ServiceConfig};
