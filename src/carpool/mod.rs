//! Carpool matching and assignment.
//!
//! A booking request flows through [`guard`] (one active booking per rider),
//! [`matcher`] (candidate carpools near both ends of the trip),
//! [`pricing`] and [`assigner`] (seat reservation). [`sweeper`] runs on its
//! own timer and retires carpools whose window has closed.

pub mod assigner;
pub mod guard;
pub mod matcher;
pub mod pricing;
pub mod sweeper;

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::config::MatchingSettings;
use crate::entities::rider;
use crate::error::{AppError, AppResult};
use crate::store::{ActiveBookingStore, BookingDraft, SeatedBooking};
use crate::utils::clock::Clock;
use crate::utils::geo::{distance_km, Coordinate};

pub use assigner::CarpoolAssigner;
pub use matcher::ProximityMatcher;
pub use pricing::CostModel;
pub use sweeper::ExpirySweeper;

pub struct CarpoolEngine {
    store: Arc<dyn ActiveBookingStore>,
    clock: Arc<dyn Clock>,
    matcher: ProximityMatcher,
    assigner: CarpoolAssigner,
    pricing: CostModel,
    booking_timeout: Duration,
    sweep_interval: std::time::Duration,
}

impl CarpoolEngine {
    pub fn new(
        store: Arc<dyn ActiveBookingStore>,
        clock: Arc<dyn Clock>,
        settings: &MatchingSettings,
    ) -> AppResult<Self> {
        let booking_timeout = Duration::from_std(settings.booking_timeout)
            .map_err(|e| AppError::Internal(format!("booking timeout out of range: {}", e)))?;
        let carpool_timeout = Duration::from_std(settings.carpool_timeout())
            .map_err(|e| AppError::Internal(format!("carpool timeout out of range: {}", e)))?;

        Ok(Self {
            store,
            clock,
            matcher: ProximityMatcher::from_settings(settings),
            assigner: CarpoolAssigner::new(settings.max_carpool_size, carpool_timeout),
            pricing: CostModel::from_settings(settings),
            booking_timeout,
            sweep_interval: settings.carpool_timeout(),
        })
    }

    pub fn store(&self) -> &Arc<dyn ActiveBookingStore> {
        &self.store
    }

    /// A sweeper sharing this engine's store and clock, firing once per
    /// carpool window.
    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.sweep_interval,
        )
    }

    /// Accept a ride request for `rider`: join a compatible carpool with a
    /// free seat or open a new one, and persist the priced booking.
    pub async fn book_ride(
        &self,
        rider: &rider::Model,
        pickup: Coordinate,
        destination: Coordinate,
    ) -> AppResult<SeatedBooking> {
        let now = self.clock.now();
        let trip_km = distance_km(pickup, destination)?;

        guard::ensure_no_active_booking(self.store.as_ref(), rider.id, now).await?;

        let active = self.store.active_bookings(now).await?;
        let candidates = self.matcher.candidate_carpools(pickup, destination, &active)?;
        tracing::debug!(
            rider_id = %rider.id,
            active = active.len(),
            candidates = candidates.len(),
            "Matched ride request"
        );

        let draft = BookingDraft {
            id: Uuid::new_v4(),
            rider_id: rider.id,
            pickup,
            destination,
            created_at: now,
            expires_at: now + self.booking_timeout,
            cost: self.pricing.cost(trip_km, rider.salary),
        };

        // Run the reservation as its own task so a dropped request cannot
        // abandon it halfway.
        let store = Arc::clone(&self.store);
        let assigner = self.assigner.clone();
        let seated = tokio::spawn(async move {
            assigner.assign(store.as_ref(), &candidates, draft).await
        })
        .await
        .map_err(|e| AppError::Internal(format!("assignment task failed: {}", e)))??;

        tracing::info!(
            rider_id = %rider.id,
            booking_id = %seated.booking.id,
            carpool_id = seated.carpool.id,
            carpool_size = seated.carpool.size,
            cost = seated.booking.cost,
            "Ride booked"
        );
        Ok(seated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::store::MemoryStore;
    use crate::utils::clock::ManualClock;

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        engine: Arc<CarpoolEngine>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = CarpoolEngine::new(
            store.clone(),
            clock.clone(),
            &MatchingSettings::default(),
        )
        .unwrap();
        Fixture {
            store,
            clock,
            engine: Arc::new(engine),
        }
    }

    async fn rider(store: &MemoryStore, username: &str, salary: i64) -> rider::Model {
        let model = rider::Model {
            id: Uuid::new_v4(),
            username: username.to_string(),
            first_name: username.to_string(),
            last_name: "Doe".to_string(),
            email: format!("{}@example.com", username),
            salary,
            created_at: Utc::now(),
        };
        store.ensure_rider(model.clone()).await.unwrap();
        model
    }

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[tokio::test]
    async fn test_nearby_riders_share_and_far_rider_does_not() {
        let f = fixture();
        let a = rider(&f.store, "a", 1_000).await;
        let b = rider(&f.store, "b", 90_000).await;
        let c = rider(&f.store, "c", 1_000).await;

        let booked_a = f
            .engine
            .book_ride(&a, coord(1.0, 1.0), coord(1.2, 1.2))
            .await
            .unwrap();
        assert_eq!(booked_a.carpool.size, 1);
        let trip_km = distance_km(coord(1.0, 1.0), coord(1.2, 1.2)).unwrap();
        assert!((booked_a.booking.cost - (trip_km * 5.0 + 0.1)).abs() < 1e-9);

        let booked_b = f
            .engine
            .book_ride(&b, coord(1.001, 1.001), coord(1.201, 1.199))
            .await
            .unwrap();
        assert_eq!(booked_b.carpool.id, booked_a.carpool.id);
        assert_eq!(booked_b.carpool.size, 2);

        let booked_c = f
            .engine
            .book_ride(&c, coord(10.0, 10.0), coord(10.2, 10.2))
            .await
            .unwrap();
        assert_ne!(booked_c.carpool.id, booked_a.carpool.id);
        assert_eq!(booked_c.carpool.size, 1);
    }

    #[tokio::test]
    async fn test_second_request_from_same_rider_conflicts() {
        let f = fixture();
        let a = rider(&f.store, "a", 1_000).await;

        f.engine
            .book_ride(&a, coord(1.0, 1.0), coord(1.2, 1.2))
            .await
            .unwrap();
        let again = f.engine.book_ride(&a, coord(1.0, 1.0), coord(1.2, 1.2)).await;

        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_rider_can_book_again_after_expiry() {
        let f = fixture();
        let a = rider(&f.store, "a", 1_000).await;

        let first = f
            .engine
            .book_ride(&a, coord(1.0, 1.0), coord(1.2, 1.2))
            .await
            .unwrap();
        f.clock.advance(Duration::seconds(40));
        let second = f
            .engine
            .book_ride(&a, coord(1.0, 1.0), coord(1.2, 1.2))
            .await
            .unwrap();

        assert_ne!(first.carpool.id, second.carpool.id);
        assert_eq!(second.carpool.size, 1);
    }

    #[tokio::test]
    async fn test_booking_and_carpool_share_window() {
        let f = fixture();
        let a = rider(&f.store, "a", 0).await;

        let seated = f
            .engine
            .book_ride(&a, coord(1.0, 1.0), coord(1.2, 1.2))
            .await
            .unwrap();

        assert_eq!(
            seated.booking.expires_at,
            seated.booking.created_at + Duration::seconds(40)
        );
        assert_eq!(seated.booking.expires_at, seated.carpool.expires_at);
    }

    #[tokio::test]
    async fn test_invalid_coordinates_leave_no_state() {
        let f = fixture();
        let a = rider(&f.store, "a", 0).await;

        let result = f
            .engine
            .book_ride(&a, Coordinate::new_unchecked(91.0, 0.0), coord(1.2, 1.2))
            .await;

        assert!(matches!(result, Err(AppError::Geometry(_))));
        assert!(f.store.carpools().await.is_empty());
        assert!(f.store.bookings().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_never_overfill_a_carpool() {
        let f = fixture();
        let max = MatchingSettings::default().max_carpool_size;

        // One carpool one seat short of full
        let mut seeded = None;
        for i in 0..(max - 1) {
            let member = rider(&f.store, &format!("member{}", i), 1_000).await;
            let seated = f
                .engine
                .book_ride(&member, coord(1.0, 1.0), coord(1.2, 1.2))
                .await
                .unwrap();
            seeded = Some(seated.carpool.id);
        }
        let target = seeded.unwrap();

        let mut tasks = Vec::new();
        for i in 0..12 {
            let r = rider(&f.store, &format!("racer{}", i), 1_000).await;
            let engine = Arc::clone(&f.engine);
            tasks.push(tokio::spawn(async move {
                engine
                    .book_ride(&r, coord(1.0005, 1.0005), coord(1.2005, 1.2005))
                    .await
            }));
        }

        let mut joined_target = 0;
        for task in tasks {
            let seated = task.await.unwrap().unwrap();
            if seated.carpool.id == target {
                joined_target += 1;
            }
        }
        assert_eq!(joined_target, 1);

        let carpools = f.store.carpools().await;
        assert!(carpools.iter().all(|c| c.size >= 1 && c.size <= max));
        let original = carpools.iter().find(|c| c.id == target).unwrap();
        assert_eq!(original.size, max);

        // Sizes agree with the bookings actually seated
        let bookings = f.store.bookings().await;
        for carpool in &carpools {
            let seated = bookings.iter().filter(|b| b.carpool_id == carpool.id).count();
            assert_eq!(seated as i32, carpool.size);
        }
        assert_eq!(bookings.len(), (max - 1) as usize + 12);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_from_one_rider_seat_once() {
        let f = fixture();
        let a = rider(&f.store, "a", 1_000).await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&f.engine);
            let a = a.clone();
            tasks.push(tokio::spawn(async move {
                engine.book_ride(&a, coord(1.0, 1.0), coord(1.2, 1.2)).await
            }));
        }

        let mut ok = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => ok += 1,
                Err(AppError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(f.store.bookings().await.len(), 1);
    }
}
