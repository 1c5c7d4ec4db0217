//! Isolated report service over SQLite in memory.

#![allow(dead_code)]

use std::sync::Arc;

use reportgen::db::init_in_memory;
use reportgen::notify::RecordingNotifier;
use reportgen::{
    PipelineConfig, ReportService, ReportStore, ServiceConfig, SubmitRequest, TaskStatusView,
};
use sea_orm::{ConnectionTrait, DatabaseConnection};

/// Orders, customers and stops for three tenants. `org-a/bu-b` owns orders
/// 10, 11 and 12 (11 has no customer and no stop); `org-z/bu-b` owns order
/// 20. Order 30 belongs to a tenant whose ids are UUIDs stored as text.
const SEED: &str = "
    CREATE TABLE customers (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        organization_id TEXT NOT NULL,
        business_unit_id TEXT NOT NULL
    );
    CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        pro_number TEXT NOT NULL,
        weight REAL,
        customer_id INTEGER REFERENCES customers(id),
        organization_id TEXT NOT NULL,
        business_unit_id TEXT NOT NULL
    );
    CREATE TABLE stops (
        id INTEGER PRIMARY KEY,
        order_id INTEGER NOT NULL REFERENCES orders(id),
        city TEXT NOT NULL,
        organization_id TEXT NOT NULL,
        business_unit_id TEXT NOT NULL
    );
    INSERT INTO customers VALUES (1, 'Acme Freight', 'org-a', 'bu-b');
    INSERT INTO customers VALUES (2, 'Globex, Inc.', 'org-a', 'bu-b');
    INSERT INTO customers VALUES (9, 'Other Tenant Co', 'org-z', 'bu-b');
    INSERT INTO orders VALUES (10, 'PRO-10', 1200.5, 1, 'org-a', 'bu-b');
    INSERT INTO orders VALUES (11, 'PRO-11', NULL, NULL, 'org-a', 'bu-b');
    INSERT INTO orders VALUES (12, 'PRO-12', 80, 2, 'org-a', 'bu-b');
    INSERT INTO orders VALUES (20, 'PRO-20', 10, 9, 'org-z', 'bu-b');
    INSERT INTO orders VALUES (30, 'PRO-30', 55, NULL,
        '2b7e1516-28ae-4d2a-a6d2-abf7158809cf', '3c8f2627-39bf-4e3b-b7e3-bcf8269910d0');
    INSERT INTO stops VALUES (100, 10, 'Chicago', 'org-a', 'bu-b');
    INSERT INTO stops VALUES (101, 12, 'Denver', 'org-a', 'bu-b');
    INSERT INTO stops VALUES (200, 20, 'Reno', 'org-z', 'bu-b');
";

pub struct TestHarness {
    pub db: DatabaseConnection,
    pub store: Arc<ReportStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub service: ReportService,
}

impl TestHarness {
    pub async fn new() -> Self {
        let db = init_in_memory().await.expect("in-memory database");
        db.execute_unprepared(SEED).await.expect("seed tenant tables");

        let store = Arc::new(ReportStore::memory("reports"));
        let notifier = Arc::new(RecordingNotifier::new());
        let service = ReportService::new(
            db.clone(),
            store.clone(),
            notifier.clone(),
            Arc::new(PipelineConfig::default()),
            ServiceConfig {
                concurrency: 2,
                client_id: "tms-web".to_string(),
            },
        );

        Self {
            db,
            store,
            notifier,
            service,
        }
    }

    /// Submits and waits for every in-flight job to finish.
    pub async fn run(&self, request: SubmitRequest) -> TaskStatusView {
        let task_id = self.service.submit(request).await.expect("submission accepted");
        self.service.wait_idle().await;
        self.service
            .status(&task_id)
            .await
            .expect("status query")
            .expect("task row exists")
    }

    /// Downloads the report a successful task produced.
    pub async fn report_bytes(&self, view: &TaskStatusView) -> Vec<u8> {
        let key = view
            .task_result
            .as_ref()
            .and_then(|r| r["object_key"].as_str())
            .expect("successful task has an object key");
        self.store.fetch(key).await.expect("report object")
    }

    /// Parses a CSV report into its header and records.
    pub async fn report_csv(&self, view: &TaskStatusView) -> (Vec<String>, Vec<Vec<String>>) {
        let bytes = self.report_bytes(view).await;
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers = reader
            .headers()
            .expect("csv header")
            .iter()
            .map(String::from)
            .collect();
        let rows = reader
            .records()
            .map(|r| r.expect("csv record").iter().map(String::from).collect())
            .collect();
        (headers, rows)
    }
}
