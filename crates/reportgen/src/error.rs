use std::path::PathBuf;
use thiserror::Error;

use crate::notify::NotifyError;
use crate::report::encode::EncodeError;
use crate::report::extract::ExtractError;
use crate::report::query::QueryError;
use crate::report::schema::SchemaError;
use crate::storage::UploadError;

#[derive(Error, Debug)]
pub enum ReportgenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Secret resolution error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] UploadError),

    #[error("Notifier error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Logging setup error: {0}")]
    Telemetry(#[from] crate::telemetry::TelemetryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("No configuration file found (set REPORTGEN_CONFIG or pass a path)")]
    NotFound,
}

/// Errors that reject a request at submission time, before any job runs.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Invalid delivery method: {0}")]
    InvalidDeliveryMethod(String),

    #[error("Invalid report request: {0}")]
    InvalidRequest(String),

    #[error("Failed to record task: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Report service is shutting down")]
    ShuttingDown,
}

/// Fatal errors of a single report job. Every variant ends the job in
/// `FAILED` with `kind()` and the rendered message persisted on the task row.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Failed to persist task status: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Report job panicked or was aborted: {0}")]
    Aborted(String),
}

impl ReportError {
    /// Stable machine-readable kind stored in `user_tasks.error.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::Schema(SchemaError::Catalog(_) | SchemaError::UnsupportedBackend(_)) => {
                "CatalogUnavailable"
            }
            ReportError::Schema(_) => "SchemaValidationError",
            ReportError::Query(_) => "QueryConstructionError",
            ReportError::Extract(_) => "DataFrameCreationError",
            ReportError::Encode(EncodeError::UnsupportedFormat(_)) => "InvalidFormat",
            ReportError::Encode(_) => "EncodingError",
            ReportError::Upload(_) => "StorageError",
            ReportError::Database(_) => "DatabaseError",
            ReportError::Aborted(_) => "JobAborted",
        }
    }

    /// Structured payload persisted in the task's `error` column.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        })
    }
}

pub type Result<T> = std::result::Result<T, ReportgenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_format_payload() {
        let err = ReportError::from(EncodeError::UnsupportedFormat("pdf".to_string()));
        let payload = err.to_payload();
        assert_eq!(payload["kind"], "InvalidFormat");
        assert_eq!(payload["message"], "Unsupported file format: pdf");
    }

    #[test]
    fn test_extract_error_kind() {
        let err = ReportError::from(ExtractError::Query {
            table: "orders".to_string(),
            message: "connection reset".to_string(),
        });
        assert_eq!(err.kind(), "DataFrameCreationError");
        assert!(err.to_string().contains("orders"));
    }

    #[test]
    fn test_startup_errors_convert() {
        fn listen() -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken"))
        }
        fn bind() -> Result<()> {
            listen()?;
            Ok(())
        }
        let err = bind().unwrap_err();
        assert!(matches!(err, ReportgenError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: port taken");

        let err = ReportgenError::from(ConfigError::NotFound);
        assert!(err.to_string().starts_with("Configuration error: No configuration file found"));
    }

    #[test]
    fn test_submit_error_display() {
        let err = SubmitError::InvalidDeliveryMethod("fax".to_string());
        assert_eq!(err.to_string(), "Invalid delivery method: fax");
    }
}
