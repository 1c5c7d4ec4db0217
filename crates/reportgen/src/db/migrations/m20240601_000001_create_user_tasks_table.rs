//! Creates the `user_tasks` status table.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserTasks::Table)
                    .if_not_exists()
                    .col(pk_auto(UserTasks::Id))
                    .col(string(UserTasks::BusinessUnitId).not_null())
                    .col(string(UserTasks::OrganizationId).not_null())
                    .col(string_null(UserTasks::UserId))
                    .col(string(UserTasks::TaskId).not_null())
                    .col(string(UserTasks::Status).not_null().default("RUNNING"))
                    .col(json_null(UserTasks::Result))
                    .col(json(UserTasks::Payload).not_null())
                    .col(json_null(UserTasks::Error))
                    .col(timestamp_with_time_zone(UserTasks::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(UserTasks::UpdatedAt).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_tasks_task_id")
                    .table(UserTasks::Table)
                    .col(UserTasks::TaskId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Task listing is always tenant-scoped.
        manager
            .create_index(
                Index::create()
                    .name("idx_user_tasks_tenant")
                    .table(UserTasks::Table)
                    .col(UserTasks::OrganizationId)
                    .col(UserTasks::BusinessUnitId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_tasks_status_created_at")
                    .table(UserTasks::Table)
                    .col(UserTasks::Status)
                    .col(UserTasks::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserTasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserTasks {
    Table,
    Id,
    BusinessUnitId,
    OrganizationId,
    UserId,
    TaskId,
    Status,
    Result,
    Payload,
    Error,
    CreatedAt,
    UpdatedAt,
}
