use sea_orm_migration::{prelude::*, schema::*};

use super::m20241005_000001_create_riders::Rider;
use super::m20241005_000002_create_carpools::Carpool;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    .col(uuid(Booking::RiderId).not_null())
                    .col(big_integer(Booking::CarpoolId).not_null())
                    .col(double(Booking::PickupLat).not_null())
                    .col(double(Booking::PickupLon).not_null())
                    .col(double(Booking::DestLat).not_null())
                    .col(double(Booking::DestLon).not_null())
                    .col(timestamp_with_time_zone(Booking::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(Booking::ExpiresAt).not_null())
                    .col(double(Booking::Cost).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_rider")
                            .from(Booking::Table, Booking::RiderId)
                            .to(Rider::Table, Rider::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_carpool")
                            .from(Booking::Table, Booking::CarpoolId)
                            .to(Carpool::Table, Carpool::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_booking_expires_at")
                    .table(Booking::Table)
                    .col(Booking::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_booking_rider_id")
                    .table(Booking::Table)
                    .col(Booking::RiderId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Booking {
    Table,
    Id,
    RiderId,
    CarpoolId,
    PickupLat,
    PickupLon,
    DestLat,
    DestLon,
    CreatedAt,
    ExpiresAt,
    Cost,
}
