use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    ActiveBookingStore, BookingDraft, CarpoolDraft, JoinOutcome, SeatedBooking, StoreError,
    StoreResult,
};
use crate::entities::{booking, carpool, rider};

#[derive(Default)]
struct Tables {
    riders: HashMap<Uuid, rider::Model>,
    carpools: BTreeMap<i64, carpool::Model>,
    bookings: Vec<booking::Model>,
    next_carpool_id: i64,
}

impl Tables {
    fn ensure_no_active_booking(&self, rider_id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        if !self.riders.contains_key(&rider_id) {
            return Err(StoreError::UnknownRider(rider_id));
        }
        if self
            .bookings
            .iter()
            .any(|b| b.rider_id == rider_id && b.is_active(now))
        {
            return Err(StoreError::RiderAlreadyBooked(rider_id));
        }
        Ok(())
    }
}

/// Process-local store. One lock guards all tables, so every unit is
/// trivially atomic; used for `STORE_BACKEND=memory` and in tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every carpool currently stored, ordered by id.
    pub async fn carpools(&self) -> Vec<carpool::Model> {
        self.tables.lock().await.carpools.values().cloned().collect()
    }

    /// Every booking currently stored, expired or not.
    pub async fn bookings(&self) -> Vec<booking::Model> {
        self.tables.lock().await.bookings.clone()
    }
}

#[async_trait]
impl ActiveBookingStore for MemoryStore {
    async fn find_rider(&self, rider_id: Uuid) -> StoreResult<Option<rider::Model>> {
        Ok(self.tables.lock().await.riders.get(&rider_id).cloned())
    }

    async fn ensure_rider(&self, rider: rider::Model) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.riders.values().any(|r| r.username == rider.username) {
            return Ok(false);
        }
        tables.riders.insert(rider.id, rider);
        Ok(true)
    }

    async fn update_salary(
        &self,
        rider_id: Uuid,
        salary: i64,
    ) -> StoreResult<Option<rider::Model>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.riders.get_mut(&rider_id).map(|rider| {
            rider.salary = salary;
            rider.clone()
        }))
    }

    async fn active_bookings(&self, now: DateTime<Utc>) -> StoreResult<Vec<booking::Model>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookings
            .iter()
            .filter(|b| b.is_active(now))
            .cloned()
            .collect())
    }

    async fn active_booking_for_rider(
        &self,
        rider_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<booking::Model>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookings
            .iter()
            .find(|b| b.rider_id == rider_id && b.is_active(now))
            .cloned())
    }

    async fn carpools_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<carpool::Model>> {
        let tables = self.tables.lock().await;
        let mut found: Vec<carpool::Model> = ids
            .iter()
            .filter_map(|id| tables.carpools.get(id).cloned())
            .collect();
        found.sort_by_key(|c| c.id);
        found.dedup_by_key(|c| c.id);
        Ok(found)
    }

    async fn join_carpool(
        &self,
        carpool_id: i64,
        draft: BookingDraft,
        max_size: i32,
    ) -> StoreResult<JoinOutcome> {
        let now = draft.created_at;
        let mut tables = self.tables.lock().await;

        tables.ensure_no_active_booking(draft.rider_id, now)?;

        let Some(carpool) = tables.carpools.get_mut(&carpool_id) else {
            return Ok(JoinOutcome::Closed);
        };
        if !carpool.is_active(now) {
            return Ok(JoinOutcome::Closed);
        }
        if !carpool.has_free_seat(max_size) {
            return Ok(JoinOutcome::Full);
        }

        carpool.size += 1;
        let carpool = carpool.clone();
        let booking = draft.seat_in(carpool.id);
        tables.bookings.push(booking.clone());

        Ok(JoinOutcome::Seated(SeatedBooking { booking, carpool }))
    }

    async fn open_carpool(
        &self,
        carpool: CarpoolDraft,
        draft: BookingDraft,
    ) -> StoreResult<SeatedBooking> {
        let mut tables = self.tables.lock().await;

        tables.ensure_no_active_booking(draft.rider_id, draft.created_at)?;

        tables.next_carpool_id += 1;
        let carpool = carpool::Model {
            id: tables.next_carpool_id,
            created_at: carpool.created_at,
            expires_at: carpool.expires_at,
            size: 1,
        };
        tables.carpools.insert(carpool.id, carpool.clone());

        let booking = draft.seat_in(carpool.id);
        tables.bookings.push(booking.clone());

        Ok(SeatedBooking { booking, carpool })
    }

    async fn delete_expired_carpools(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;

        let expired: Vec<i64> = tables
            .carpools
            .values()
            .filter(|c| c.expires_at < now)
            .map(|c| c.id)
            .collect();

        for id in &expired {
            tables.carpools.remove(id);
        }
        // Cascade, even for a late joiner whose booking window is still open
        tables
            .bookings
            .retain(|b| !expired.contains(&b.carpool_id));

        Ok(expired.len() as u64)
    }
}
