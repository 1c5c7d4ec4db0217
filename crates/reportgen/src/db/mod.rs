//! Task status persistence on SeaORM.
//!
//! The same connection pool serves the `user_tasks` table and the tenant
//! tables that reports read from.

use std::fmt;
use std::str::FromStr;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use serde::{Deserialize, Serialize};

pub mod entities;
pub mod error;
pub mod migrations;
pub mod task_repo;

pub use error::DatabaseError;
pub use migrations::Migrator;
pub use task_repo::TaskFilter;

use crate::sanitize::redact_database_url;

/// Lifecycle of a report task. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Running,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "RUNNING",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(TaskStatus::Running),
            "SUCCESS" => Ok(TaskStatus::Success),
            "FAILED" => Ok(TaskStatus::Failed),
            _ => Err(DatabaseError::InvalidStatus(s.to_string())),
        }
    }
}

/// Connects and applies pending migrations.
pub async fn init_database(
    url: &str,
    max_connections: u32,
) -> Result<DatabaseConnection, DatabaseError> {
    let mut opts = ConnectOptions::new(url.to_owned());
    opts.max_connections(max_connections.max(1))
        .sqlx_logging(false);

    let conn = Database::connect(opts).await?;
    Migrator::up(&conn, None).await?;

    log::info!("Database ready at {}", redact_database_url(url));
    Ok(conn)
}

/// Private in-memory SQLite database with migrations applied.
pub async fn init_in_memory() -> Result<DatabaseConnection, DatabaseError> {
    // A single connection, since every SQLite memory connection is its own database.
    init_database("sqlite::memory:", 1).await
}
