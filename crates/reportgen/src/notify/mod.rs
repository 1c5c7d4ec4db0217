//! Completion callbacks to the operational notification service.

pub mod retry;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::NotifierConfig;
use crate::db::TaskStatus;
use crate::sanitize::redact_url_query;

pub use retry::RetryPolicy;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to build notifier client: {0}")]
    Client(String),

    #[error("Notification endpoint returned {status}")]
    Status { status: u16 },

    #[error("Notification request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Notification for task {task_id} not delivered after {attempts} attempts: {last}")]
    Exhausted {
        task_id: String,
        attempts: u32,
        last: Box<NotifyError>,
    },
}

impl NotifyError {
    fn is_transient(&self) -> bool {
        match self {
            NotifyError::Status { status } => *status == 429 || *status >= 500,
            NotifyError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            NotifyError::Client(_) | NotifyError::Exhausted { .. } => false,
        }
    }
}

/// Body posted when a task reaches a terminal state. Consumers should be
/// idempotent on `task_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNotification {
    pub task_id: String,
    pub status: TaskStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub client_id: String,
    pub organization_id: String,
    pub business_unit_id: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &TaskNotification) -> Result<(), NotifyError>;
}

/// Used when no endpoint is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, notification: &TaskNotification) -> Result<(), NotifyError> {
        debug!(
            task_id = %notification.task_id,
            status = %notification.status,
            "No notifier configured, skipping"
        );
        Ok(())
    }
}

pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl HttpNotifier {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            retry,
        })
    }

    async fn post_once(&self, notification: &TaskNotification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: &TaskNotification) -> Result<(), NotifyError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.post_once(notification).await {
                Ok(()) => {
                    debug!(
                        task_id = %notification.task_id,
                        attempts,
                        "Task notification delivered"
                    );
                    return Ok(());
                }
                Err(e) if e.is_transient() && self.retry.should_retry(attempts) => {
                    let delay = self.retry.calculate_delay(attempts - 1);
                    warn!(
                        task_id = %notification.task_id,
                        endpoint = %redact_url_query(&self.endpoint),
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Task notification failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if attempts > 1 => {
                    return Err(NotifyError::Exhausted {
                        task_id: notification.task_id.clone(),
                        attempts,
                        last: Box::new(e),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Builds the notifier the config asks for.
pub fn from_config(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match &config.endpoint {
        Some(endpoint) => Ok(Arc::new(HttpNotifier::new(
            endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
            RetryPolicy::with_max_attempts(config.max_attempts),
        )?)),
        None => Ok(Arc::new(NoopNotifier)),
    }
}

/// Keeps every notification in memory. Useful for tests and dry runs.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<TaskNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<TaskNotification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &TaskNotification) -> Result<(), NotifyError> {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
        Ok(())
    }
}
