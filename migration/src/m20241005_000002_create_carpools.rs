use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Carpool::Table)
                    .if_not_exists()
                    .col(big_integer(Carpool::Id).auto_increment().primary_key())
                    .col(timestamp_with_time_zone(Carpool::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(Carpool::ExpiresAt).not_null())
                    .col(integer(Carpool::Size).not_null())
                    .check(Expr::col(Carpool::Size).gte(1))
                    .to_owned(),
            )
            .await?;

        // The sweeper deletes by expiry
        manager
            .create_index(
                Index::create()
                    .name("idx_carpool_expires_at")
                    .table(Carpool::Table)
                    .col(Carpool::ExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Carpool::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Carpool {
    Table,
    Id,
    CreatedAt,
    ExpiresAt,
    Size,
}
