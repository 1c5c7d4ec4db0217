//! Report task status rows.

use sea_orm::entity::prelude::*;

use crate::db::{DatabaseError, TaskStatus};

/// One row per submitted report request.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub business_unit_id: String,
    pub organization_id: String,
    pub user_id: Option<String>,
    /// Public task identifier (UUIDv4).
    #[sea_orm(unique)]
    pub task_id: String,
    /// RUNNING, SUCCESS or FAILED.
    pub status: String,
    pub result: Option<Json>,
    /// The report request exactly as accepted.
    pub payload: Json,
    pub error: Option<Json>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn task_status(&self) -> Result<TaskStatus, DatabaseError> {
        self.status.parse()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
