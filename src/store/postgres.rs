use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use super::{
    ActiveBookingStore, BookingDraft, CarpoolDraft, JoinOutcome, SeatedBooking, StoreError,
    StoreResult,
};
use crate::entities::{booking, carpool, rider};

/// Postgres-backed store. Capacity and rider checks rely on row locks
/// (`SELECT ... FOR UPDATE`) taken inside one transaction per unit.
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lock the rider row for the rest of `txn` and make sure the rider has
    /// no active booking. Serializes concurrent requests from one rider.
    async fn lock_rider(
        txn: &DatabaseTransaction,
        rider_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        rider::Entity::find_by_id(rider_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or(StoreError::UnknownRider(rider_id))?;

        let active = booking::Entity::find()
            .filter(booking::Column::RiderId.eq(rider_id))
            .filter(booking::Column::ExpiresAt.gt(now))
            .one(txn)
            .await?;

        if active.is_some() {
            return Err(StoreError::RiderAlreadyBooked(rider_id));
        }
        Ok(())
    }

    async fn insert_booking(
        txn: &DatabaseTransaction,
        booking: booking::Model,
    ) -> StoreResult<booking::Model> {
        let row = booking::ActiveModel {
            id: Set(booking.id),
            rider_id: Set(booking.rider_id),
            carpool_id: Set(booking.carpool_id),
            pickup_lat: Set(booking.pickup_lat),
            pickup_lon: Set(booking.pickup_lon),
            dest_lat: Set(booking.dest_lat),
            dest_lon: Set(booking.dest_lon),
            created_at: Set(booking.created_at),
            expires_at: Set(booking.expires_at),
            cost: Set(booking.cost),
        };
        Ok(row.insert(txn).await?)
    }
}

#[async_trait]
impl ActiveBookingStore for PgStore {
    async fn find_rider(&self, rider_id: Uuid) -> StoreResult<Option<rider::Model>> {
        Ok(rider::Entity::find_by_id(rider_id).one(&self.db).await?)
    }

    async fn ensure_rider(&self, rider: rider::Model) -> StoreResult<bool> {
        let existing = rider::Entity::find()
            .filter(rider::Column::Username.eq(rider.username.as_str()))
            .one(&self.db)
            .await?;

        if existing.is_some() {
            return Ok(false);
        }

        rider::ActiveModel {
            id: Set(rider.id),
            username: Set(rider.username),
            first_name: Set(rider.first_name),
            last_name: Set(rider.last_name),
            email: Set(rider.email),
            salary: Set(rider.salary),
            created_at: Set(rider.created_at),
        }
        .insert(&self.db)
        .await?;
        Ok(true)
    }

    async fn update_salary(
        &self,
        rider_id: Uuid,
        salary: i64,
    ) -> StoreResult<Option<rider::Model>> {
        let Some(existing) = rider::Entity::find_by_id(rider_id).one(&self.db).await? else {
            return Ok(None);
        };

        let mut row: rider::ActiveModel = existing.into();
        row.salary = Set(salary);
        Ok(Some(row.update(&self.db).await?))
    }

    async fn active_bookings(&self, now: DateTime<Utc>) -> StoreResult<Vec<booking::Model>> {
        Ok(booking::Entity::find()
            .filter(booking::Column::ExpiresAt.gt(now))
            .all(&self.db)
            .await?)
    }

    async fn active_booking_for_rider(
        &self,
        rider_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<booking::Model>> {
        Ok(booking::Entity::find()
            .filter(booking::Column::RiderId.eq(rider_id))
            .filter(booking::Column::ExpiresAt.gt(now))
            .one(&self.db)
            .await?)
    }

    async fn carpools_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<carpool::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(carpool::Entity::find()
            .filter(carpool::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(carpool::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn join_carpool(
        &self,
        carpool_id: i64,
        draft: BookingDraft,
        max_size: i32,
    ) -> StoreResult<JoinOutcome> {
        let now = draft.created_at;
        // Dropping the transaction without commit rolls it back
        let txn = self.db.begin().await?;

        Self::lock_rider(&txn, draft.rider_id, now).await?;

        let Some(current) = carpool::Entity::find_by_id(carpool_id)
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            return Ok(JoinOutcome::Closed);
        };

        if !current.is_active(now) {
            return Ok(JoinOutcome::Closed);
        }
        if !current.has_free_seat(max_size) {
            return Ok(JoinOutcome::Full);
        }

        let size = current.size;
        let mut row: carpool::ActiveModel = current.into();
        row.size = Set(size + 1);
        let carpool = row.update(&txn).await?;

        let booking = Self::insert_booking(&txn, draft.seat_in(carpool.id)).await?;
        txn.commit().await?;

        Ok(JoinOutcome::Seated(SeatedBooking { booking, carpool }))
    }

    async fn open_carpool(
        &self,
        carpool: CarpoolDraft,
        draft: BookingDraft,
    ) -> StoreResult<SeatedBooking> {
        let txn = self.db.begin().await?;

        Self::lock_rider(&txn, draft.rider_id, draft.created_at).await?;

        let carpool = carpool::ActiveModel {
            created_at: Set(carpool.created_at),
            expires_at: Set(carpool.expires_at),
            size: Set(1),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let booking = Self::insert_booking(&txn, draft.seat_in(carpool.id)).await?;
        txn.commit().await?;

        Ok(SeatedBooking { booking, carpool })
    }

    async fn delete_expired_carpools(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        // Bookings go with their carpool through the cascading foreign key,
        // including a late joiner's booking whose own window is still open.
        // Row locks held by an in-flight join make this wait for its commit.
        let result = carpool::Entity::delete_many()
            .filter(carpool::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
