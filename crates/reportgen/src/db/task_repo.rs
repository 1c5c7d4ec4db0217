//! Task repository: reads and status transitions for `user_tasks`.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use super::entities::user_task::{self, ActiveModel, Column, Entity as UserTask};
use super::{DatabaseError, TaskStatus};
use crate::report::request::ReportRequest;

/// Default page size for task listings.
pub const DEFAULT_LIMIT: u64 = 50;
/// Upper bound on a single page.
pub const MAX_LIMIT: u64 = 500;

/// Tenant-scoped listing filter.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub organization_id: String,
    pub business_unit_id: String,
    pub status: Option<TaskStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl TaskFilter {
    pub fn effective_limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

/// Records a newly accepted request as RUNNING.
pub async fn insert_running<C>(
    db: &C,
    task_id: &str,
    request: &ReportRequest,
) -> Result<user_task::Model, DatabaseError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let model = ActiveModel {
        business_unit_id: Set(request.tenant.business_unit_id.clone()),
        organization_id: Set(request.tenant.organization_id.clone()),
        user_id: Set(request.user_id.clone()),
        task_id: Set(task_id.to_string()),
        status: Set(TaskStatus::Running.as_str().to_string()),
        result: Set(None),
        payload: Set(serde_json::to_value(request)?),
        error: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let inserted = model.insert(db).await?;
    log::debug!("Task {} recorded as RUNNING", task_id);
    Ok(inserted)
}

pub async fn find_by_task_id<C>(
    db: &C,
    task_id: &str,
) -> Result<Option<user_task::Model>, DatabaseError>
where
    C: ConnectionTrait,
{
    Ok(UserTask::find()
        .filter(Column::TaskId.eq(task_id))
        .one(db)
        .await?)
}

pub async fn mark_succeeded<C>(
    db: &C,
    task_id: &str,
    result: serde_json::Value,
) -> Result<(), DatabaseError>
where
    C: ConnectionTrait,
{
    finish(db, task_id, TaskStatus::Success, Some(result), None).await
}

pub async fn mark_failed<C>(
    db: &C,
    task_id: &str,
    error: serde_json::Value,
) -> Result<(), DatabaseError>
where
    C: ConnectionTrait,
{
    finish(db, task_id, TaskStatus::Failed, None, Some(error)).await
}

/// Moves a RUNNING task to a terminal state in a single conditional
/// update. A task that already left RUNNING is never touched again.
async fn finish<C>(
    db: &C,
    task_id: &str,
    status: TaskStatus,
    result: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
) -> Result<(), DatabaseError>
where
    C: ConnectionTrait,
{
    let updated = UserTask::update_many()
        .col_expr(Column::Status, Expr::value(status.as_str()))
        .col_expr(Column::Result, Expr::value(result))
        .col_expr(Column::Error, Expr::value(error))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(Column::TaskId.eq(task_id))
        .filter(Column::Status.eq(TaskStatus::Running.as_str()))
        .exec(db)
        .await?;

    if updated.rows_affected == 0 {
        return match find_by_task_id(db, task_id).await? {
            Some(existing) => Err(DatabaseError::TaskAlreadyFinished {
                task_id: task_id.to_string(),
                status: existing.status,
            }),
            None => Err(DatabaseError::TaskNotFound(task_id.to_string())),
        };
    }

    log::debug!("Task {} moved to {}", task_id, status);
    Ok(())
}

/// Lists one tenant's tasks, newest first. Returns `(page, total)`.
pub async fn query<C>(
    db: &C,
    filter: &TaskFilter,
) -> Result<(Vec<user_task::Model>, u64), DatabaseError>
where
    C: ConnectionTrait,
{
    let mut select = UserTask::find()
        .filter(Column::OrganizationId.eq(filter.organization_id.as_str()))
        .filter(Column::BusinessUnitId.eq(filter.business_unit_id.as_str()));
    if let Some(status) = filter.status {
        select = select.filter(Column::Status.eq(status.as_str()));
    }

    let total = select.clone().count(db).await?;
    let rows = select
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id)
        .limit(filter.effective_limit())
        .offset(filter.effective_offset())
        .all(db)
        .await?;

    Ok((rows, total))
}
