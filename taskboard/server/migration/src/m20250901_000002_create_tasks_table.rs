use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

use crate::m20250901_000001_create_users_table::Users;

const FK_TASKS_TO_USERS: &str = "fk-tasks-owner";
const IDX_TASKS_OWNER: &str = "idx-tasks-owner";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(pk_auto(Tasks::Id))
                    .col(string(Tasks::Owner))
                    .col(string(Tasks::Title))
                    .col(text_null(Tasks::Description))
                    .col(timestamp_with_time_zone(Tasks::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TASKS_TO_USERS)
                            .from(Tasks::Table, Tasks::Owner)
                            .to(Users::Table, Users::Identity)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(IDX_TASKS_OWNER)
                    .table(Tasks::Table)
                    .col(Tasks::Owner)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(IDX_TASKS_OWNER)
                    .table(Tasks::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    Owner,
    Title,
    Description,
    CreatedAt,
}
