use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::secrets::{resolve_secret, resolve_secret_optional, SecretError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection to the tenant database. The URL is a secret and resolves
/// from `url`, `urlFile` or `urlEnvVar`, in that order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_file: Option<String>,
    #[serde(default)]
    pub url_env_var: Option<String>,
    /// Schema that report tables live in.
    #[serde(default = "default_db_schema")]
    pub schema: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn resolve_url(&self) -> Result<SecretString, SecretError> {
        resolve_secret(
            self.url.as_deref(),
            self.url_file.as_deref(),
            self.url_env_var.as_deref(),
        )
    }
}

fn default_db_schema() -> String {
    "public".to_string()
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    #[default]
    Local,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Root directory for the `local` backend.
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub access_key_file: Option<String>,
    #[serde(default)]
    pub access_key_env_var: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub secret_key_file: Option<String>,
    #[serde(default)]
    pub secret_key_env_var: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
    #[serde(default = "default_url_expiry_secs")]
    pub url_expiry_secs: u64,
}

impl StorageConfig {
    /// Static S3 credentials, if configured. Both keys or neither.
    pub fn resolve_credentials(&self) -> Result<Option<(SecretString, SecretString)>, SecretError> {
        let access = resolve_secret_optional(
            self.access_key.as_deref(),
            self.access_key_file.as_deref(),
            self.access_key_env_var.as_deref(),
        )?;
        let secret = resolve_secret_optional(
            self.secret_key.as_deref(),
            self.secret_key_file.as_deref(),
            self.secret_key_env_var.as_deref(),
        )?;
        match (access, secret) {
            (Some(access), Some(secret)) => Ok(Some((access, secret))),
            (None, None) => Ok(None),
            _ => Err(SecretError::NoSourceProvided),
        }
    }
}

fn default_bucket() -> String {
    "reports".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_url_expiry_secs() -> u64 {
    3600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            bucket: default_bucket(),
            root: None,
            endpoint: None,
            region: default_region(),
            access_key: None,
            access_key_file: None,
            access_key_env_var: None,
            secret_key: None,
            secret_key_file: None,
            secret_key_env_var: None,
            allow_http: false,
            url_expiry_secs: default_url_expiry_secs(),
        }
    }
}

/// Completion callback. Without an endpoint notifications are only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifierConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_client_id() -> String {
    "reportgen".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            client_id: default_client_id(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// Maximum number of report jobs running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    num_cpus::get()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
