//! Durable state for the matching core: riders (read mostly), carpools and
//! bookings.
//!
//! Every write that touches carpool capacity goes through one of the two
//! atomic units, [`ActiveBookingStore::join_carpool`] and
//! [`ActiveBookingStore::open_carpool`]. Both re-check, under lock, that the
//! rider holds no active booking, so a seat is never reserved without its
//! booking and a rider never ends up with two active bookings.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use uuid::Uuid;

use crate::entities::{booking, carpool, rider};
use crate::utils::geo::Coordinate;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("rider {0} already has an active booking")]
    RiderAlreadyBooked(Uuid),
    #[error("rider {0} does not exist")]
    UnknownRider(Uuid),
}

/// A booking that has been priced but not yet bound to a carpool.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub pickup: Coordinate,
    pub destination: Coordinate,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub cost: f64,
}

impl BookingDraft {
    pub fn seat_in(self, carpool_id: i64) -> booking::Model {
        booking::Model {
            id: self.id,
            rider_id: self.rider_id,
            carpool_id,
            pickup_lat: self.pickup.lat,
            pickup_lon: self.pickup.lon,
            dest_lat: self.destination.lat,
            dest_lon: self.destination.lon,
            created_at: self.created_at,
            expires_at: self.expires_at,
            cost: self.cost,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CarpoolDraft {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A persisted booking together with the carpool state right after it was
/// seated.
#[derive(Debug, Clone, PartialEq)]
pub struct SeatedBooking {
    pub booking: booking::Model,
    pub carpool: carpool::Model,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Seated(SeatedBooking),
    /// The carpool filled up since it was picked as a candidate.
    Full,
    /// The carpool expired or was swept since it was picked.
    Closed,
}

#[async_trait]
pub trait ActiveBookingStore: Send + Sync {
    async fn find_rider(&self, rider_id: Uuid) -> StoreResult<Option<rider::Model>>;

    /// Insert the rider unless one with the same username exists. Returns
    /// whether a row was inserted.
    async fn ensure_rider(&self, rider: rider::Model) -> StoreResult<bool>;

    async fn update_salary(&self, rider_id: Uuid, salary: i64)
        -> StoreResult<Option<rider::Model>>;

    /// Bookings with `now < expires_at`.
    async fn active_bookings(&self, now: DateTime<Utc>) -> StoreResult<Vec<booking::Model>>;

    async fn active_booking_for_rider(
        &self,
        rider_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<booking::Model>>;

    /// Carpools with the given ids, ordered by ascending id. Missing ids are
    /// skipped.
    async fn carpools_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<carpool::Model>>;

    /// Atomically: check the rider has no active booking, check the carpool
    /// is open with `size < max_size`, increment its size and insert the
    /// booking.
    async fn join_carpool(
        &self,
        carpool_id: i64,
        draft: BookingDraft,
        max_size: i32,
    ) -> StoreResult<JoinOutcome>;

    /// Atomically: check the rider has no active booking, create a carpool
    /// of size 1 and insert the booking into it.
    async fn open_carpool(
        &self,
        carpool: CarpoolDraft,
        draft: BookingDraft,
    ) -> StoreResult<SeatedBooking>;

    /// Delete carpools with `expires_at < now` along with their bookings.
    /// Returns the number of carpools removed.
    async fn delete_expired_carpools(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}
