pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod telemetry;
pub mod worker;

pub use config::{load_config, resolve_config_path, Config};
pub use db::{init_database, DatabaseError, TaskStatus};
pub use error::{ConfigError, ReportError, ReportgenError, Result, SubmitError};
pub use notify::{HttpNotifier, NoopNotifier, Notifier, TaskNotification};
pub use pipeline::{PipelineConfig, PipelineContext, ReportOutcome, ReportPipeline};
pub use report::{ReportRequest, SubmitRequest, Table, Tenant};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use storage::{ReportStore, StoredReport, UploadError};
pub use telemetry::{init_logging, TelemetryError};
pub use worker::{ReportService, ServiceConfig, TaskPage, TaskQuery, TaskStatusView};
