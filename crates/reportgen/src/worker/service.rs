use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use sea_orm::DatabaseConnection;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::db::{task_repo, DatabaseError, TaskFilter, TaskStatus};
use crate::error::{ReportError, SubmitError};
use crate::notify::{Notifier, TaskNotification};
use crate::pipeline::{PipelineConfig, PipelineContext, ReportOutcome, ReportPipeline};
use crate::report::request::{ReportRequest, SubmitRequest, Tenant};
use crate::storage::ReportStore;

use super::job::{ReportJob, TaskPage, TaskQuery, TaskStatusView, TaskSummary};

/// Knobs for the job orchestrator.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub concurrency: usize,
    pub client_id: String,
}

impl ServiceConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.worker.concurrency,
            client_id: config.notifier.client_id.clone(),
        }
    }
}

/// Accepts report requests, runs them in the background and answers
/// status queries. Cheap to clone.
#[derive(Clone)]
pub struct ReportService {
    inner: Arc<Inner>,
}

struct Inner {
    db: DatabaseConnection,
    pipeline: ReportPipeline,
    notifier: Arc<dyn Notifier>,
    client_id: String,
    permits: Semaphore,
    in_flight: watch::Sender<usize>,
    shutdown: AtomicBool,
}

impl ReportService {
    pub fn new(
        db: DatabaseConnection,
        store: Arc<ReportStore>,
        notifier: Arc<dyn Notifier>,
        pipeline_config: Arc<PipelineConfig>,
        config: ServiceConfig,
    ) -> Self {
        let pipeline = ReportPipeline::new(pipeline_config, db.clone(), store);
        Self::with_pipeline(db, pipeline, notifier, config)
    }

    pub fn with_pipeline(
        db: DatabaseConnection,
        pipeline: ReportPipeline,
        notifier: Arc<dyn Notifier>,
        config: ServiceConfig,
    ) -> Self {
        let concurrency = config.concurrency.max(1);
        let (in_flight, _) = watch::channel(0);
        info!("Report service started with {} job slots", concurrency);

        Self {
            inner: Arc::new(Inner {
                db,
                pipeline,
                notifier,
                client_id: config.client_id,
                permits: Semaphore::new(concurrency),
                in_flight,
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// Records the request as RUNNING and starts it in the background.
    ///
    /// Requests that fail validation are rejected here and never get a
    /// task row.
    pub async fn submit(&self, submission: SubmitRequest) -> Result<String, SubmitError> {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            return Err(SubmitError::ShuttingDown);
        }

        let request = ReportRequest::try_from(submission)?;
        let job = ReportJob::new(request);
        task_repo::insert_running(&self.inner.db, &job.task_id, &job.request).await?;

        info!(
            task_id = %job.task_id,
            table = %job.request.table_name,
            format = %job.request.file_format,
            delivery = %job.request.delivery_method,
            "Report task accepted"
        );

        let task_id = job.task_id.clone();
        let guard = self.track();
        let service = self.clone();
        tokio::spawn(async move {
            service.execute(job).await;
            drop(guard);
        });

        Ok(task_id)
    }

    async fn execute(&self, job: ReportJob) {
        let _permit = match self.inner.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(task_id = %job.task_id, error = %e, "Job slots closed, task not started");
                return;
            }
        };

        let ReportJob { task_id, request } = job;
        let tenant = request.tenant.clone();
        let span = info_span!("report_job", task_id = %task_id, table = %request.table_name);

        // Run on its own task so a panic surfaces as a JoinError and the
        // row still reaches FAILED.
        let service = self.clone();
        let id = task_id.clone();
        let handle =
            tokio::spawn(async move { service.run(&id, request).await }.instrument(span.clone()));

        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                error!(parent: &span, kind = e.kind(), error = %e, "Report job failed");
            }
            Err(join_err) => {
                let err = ReportError::Aborted(join_err.to_string());
                error!(parent: &span, error = %err, "Report job aborted");
                self.record_failure(&task_id, &tenant, &err).await;
            }
        }
    }

    /// Runs one job to completion: pipeline, terminal status, notification.
    /// The pipeline error is returned unchanged after it has been recorded.
    pub async fn run(
        &self,
        task_id: &str,
        request: ReportRequest,
    ) -> Result<ReportOutcome, ReportError> {
        let started = Instant::now();
        let tenant = request.tenant.clone();
        let mut ctx = PipelineContext::new(task_id, request);

        let result = match self.inner.pipeline.run(&mut ctx).await {
            Ok(outcome) => task_repo::mark_succeeded(&self.inner.db, task_id, outcome.to_json())
                .await
                .map(|()| outcome)
                .map_err(ReportError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                info!(
                    task_id,
                    rows = outcome.row_count,
                    file = %outcome.file_name,
                    dropped = outcome.dropped_columns.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Report task succeeded"
                );
                self.notify(task_id, &tenant, TaskStatus::Success, Some(outcome.to_json()), None)
                    .await;
                Ok(outcome)
            }
            Err(err) => {
                self.record_failure(task_id, &tenant, &err).await;
                Err(err)
            }
        }
    }

    async fn record_failure(&self, task_id: &str, tenant: &Tenant, err: &ReportError) {
        let payload = err.to_payload();
        match task_repo::mark_failed(&self.inner.db, task_id, payload.clone()).await {
            Ok(()) => {}
            Err(DatabaseError::TaskAlreadyFinished { status, .. }) => {
                warn!(task_id, %status, "Task already finished, failure not recorded");
                return;
            }
            Err(db_err) => {
                error!(task_id, error = %db_err, "Failed to record task failure");
            }
        }
        self.notify(task_id, tenant, TaskStatus::Failed, None, Some(payload))
            .await;
    }

    async fn notify(
        &self,
        task_id: &str,
        tenant: &Tenant,
        status: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<serde_json::Value>,
    ) {
        let notification = TaskNotification {
            task_id: task_id.to_string(),
            status,
            result,
            error,
            client_id: self.inner.client_id.clone(),
            organization_id: tenant.organization_id.clone(),
            business_unit_id: tenant.business_unit_id.clone(),
        };
        if let Err(e) = self.inner.notifier.notify(&notification).await {
            warn!(task_id, error = %e, "Task notification not delivered");
        }
    }

    pub async fn status(&self, task_id: &str) -> Result<Option<TaskStatusView>, DatabaseError> {
        task_repo::find_by_task_id(&self.inner.db, task_id)
            .await?
            .map(TaskStatusView::try_from)
            .transpose()
    }

    pub async fn list(&self, query: TaskQuery) -> Result<TaskPage, DatabaseError> {
        let filter = TaskFilter::from(query);
        let (rows, total) = task_repo::query(&self.inner.db, &filter).await?;
        let tasks = rows
            .into_iter()
            .map(TaskSummary::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TaskPage {
            tasks,
            total,
            limit: filter.effective_limit(),
            offset: filter.effective_offset(),
        })
    }

    /// Number of accepted jobs that have not finished yet.
    pub fn in_flight(&self) -> usize {
        *self.inner.in_flight.borrow()
    }

    /// Resolves once every accepted job has finished.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.in_flight.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Stops accepting submissions and waits for running jobs.
    pub async fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        info!(in_flight = self.in_flight(), "Shutting down report service");
        self.wait_idle().await;
        info!("All report jobs finished");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    fn track(&self) -> InFlightGuard {
        self.inner.in_flight.send_modify(|n| *n += 1);
        InFlightGuard {
            inner: self.inner.clone(),
        }
    }
}

struct InFlightGuard {
    inner: Arc<Inner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;
    use crate::notify::RecordingNotifier;
    use crate::report::schema::tests::BrokenCatalog;
    use sea_orm::ConnectionTrait;

    async fn seeded() -> DatabaseConnection {
        let db = init_in_memory().await.unwrap();
        db.execute_unprepared(
            "CREATE TABLE orders (
                id INTEGER PRIMARY KEY,
                pro_number TEXT NOT NULL,
                organization_id TEXT NOT NULL,
                business_unit_id TEXT NOT NULL
            );
            INSERT INTO orders VALUES (1, 'PRO-1', 'org-a', 'bu-b');
            INSERT INTO orders VALUES (2, 'PRO-2', 'org-a', 'bu-b');",
        )
        .await
        .unwrap();
        db
    }

    fn submission(format: &str, delivery: &str) -> SubmitRequest {
        SubmitRequest {
            table_name: "orders".to_string(),
            columns: vec!["id".to_string(), "pro_number".to_string()],
            relationships: vec![],
            organization_id: "org-a".to_string(),
            business_unit_id: "bu-b".to_string(),
            file_format: format.to_string(),
            delivery_method: delivery.to_string(),
            user_id: Some("user-1".to_string()),
        }
    }

    fn config() -> ServiceConfig {
        ServiceConfig {
            concurrency: 2,
            client_id: "tms-web".to_string(),
        }
    }

    fn service(db: DatabaseConnection, notifier: Arc<RecordingNotifier>) -> ReportService {
        ReportService::new(
            db,
            Arc::new(ReportStore::memory("reports")),
            notifier,
            Arc::new(PipelineConfig::default()),
            config(),
        )
    }

    #[tokio::test]
    async fn test_submit_runs_job_to_success() {
        let notifier = Arc::new(RecordingNotifier::new());
        let service = service(seeded().await, notifier.clone());

        let task_id = service.submit(submission("csv", "email")).await.unwrap();
        service.wait_idle().await;

        let view = service.status(&task_id).await.unwrap().unwrap();
        assert_eq!(view.task_status, TaskStatus::Success);
        let result = view.task_result.unwrap();
        assert_eq!(result["row_count"], 2);
        assert_eq!(result["delivery_method"], "email");
        assert!(view.task_error.is_none());

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].task_id, task_id);
        assert_eq!(sent[0].status, TaskStatus::Success);
        assert_eq!(sent[0].client_id, "tms-web");
    }

    #[tokio::test]
    async fn test_failed_job_records_error_and_notifies() {
        let notifier = Arc::new(RecordingNotifier::new());
        let service = service(seeded().await, notifier.clone());

        let task_id = service.submit(submission("pdf", "local")).await.unwrap();
        service.wait_idle().await;

        let view = service.status(&task_id).await.unwrap().unwrap();
        assert_eq!(view.task_status, TaskStatus::Failed);
        let error = view.task_error.unwrap();
        assert_eq!(error["kind"], "InvalidFormat");
        assert_eq!(error["message"], "Unsupported file format: pdf");
        assert_eq!(notifier.sent()[0].status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_run_returns_pipeline_error() {
        let db = seeded().await;
        let notifier = Arc::new(RecordingNotifier::new());
        let pipeline = ReportPipeline::with_catalog(
            Arc::new(PipelineConfig::default()),
            db.clone(),
            Arc::new(BrokenCatalog),
            Arc::new(ReportStore::memory("reports")),
        );
        let service = ReportService::with_pipeline(db.clone(), pipeline, notifier, config());

        let request = ReportRequest::try_from(submission("csv", "email")).unwrap();
        task_repo::insert_running(&db, "task-1", &request).await.unwrap();
        let err = service.run("task-1", request).await.unwrap_err();
        assert_eq!(err.kind(), "CatalogUnavailable");

        let view = service.status("task-1").await.unwrap().unwrap();
        assert_eq!(view.task_status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_invalid_delivery_writes_no_row() {
        let db = seeded().await;
        let service = service(db.clone(), Arc::new(RecordingNotifier::new()));

        let err = service.submit(submission("csv", "fax")).await.unwrap_err();
        assert!(matches!(err, SubmitError::InvalidDeliveryMethod(ref m) if m == "fax"));

        let page = service
            .list(TaskQuery {
                organization_id: "org-a".to_string(),
                business_unit_id: "bu-b".to_string(),
                status: None,
                limit: None,
                offset: None,
            })
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_list_reports_submitted_tasks() {
        let service = service(seeded().await, Arc::new(RecordingNotifier::new()));
        for _ in 0..3 {
            service.submit(submission("csv", "email")).await.unwrap();
        }
        service.wait_idle().await;

        let page = service
            .list(TaskQuery {
                organization_id: "org-a".to_string(),
                business_unit_id: "bu-b".to_string(),
                status: Some(TaskStatus::Success),
                limit: Some(2),
                offset: None,
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.tasks.len(), 2);
        assert_eq!(page.limit, 2);
        assert_eq!(page.tasks[0].table_name.as_deref(), Some("orders"));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_submissions() {
        let service = service(seeded().await, Arc::new(RecordingNotifier::new()));
        service.submit(submission("csv", "email")).await.unwrap();
        service.shutdown().await;

        assert_eq!(service.in_flight(), 0);
        assert!(service.is_shutting_down());
        let err = service.submit(submission("csv", "email")).await.unwrap_err();
        assert!(matches!(err, SubmitError::ShuttingDown));
    }

    #[tokio::test]
    async fn test_unknown_task_status() {
        let service = service(seeded().await, Arc::new(RecordingNotifier::new()));
        assert!(service.status("missing").await.unwrap().is_none());
    }
}
