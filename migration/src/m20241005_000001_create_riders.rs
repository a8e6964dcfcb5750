use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rider::Table)
                    .if_not_exists()
                    .col(uuid(Rider::Id).primary_key())
                    .col(string_len(Rider::Username, 100).not_null().unique_key())
                    .col(string_len(Rider::FirstName, 100).not_null())
                    .col(string_len(Rider::LastName, 100).not_null())
                    .col(string_len(Rider::Email, 255).not_null().unique_key())
                    .col(big_integer(Rider::Salary).not_null().default(0))
                    .col(
                        timestamp_with_time_zone(Rider::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Rider::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Rider {
    Table,
    Id,
    Username,
    FirstName,
    LastName,
    Email,
    Salary,
    CreatedAt,
}
