use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::store::{ActiveBookingStore, StoreResult};
use crate::utils::clock::Clock;

/// Background task deleting carpools whose window has closed.
pub struct ExpirySweeper {
    store: Arc<dyn ActiveBookingStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn ActiveBookingStore>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval,
        }
    }

    /// One cycle: remove every carpool with `expires_at < now`.
    pub async fn sweep_once(&self) -> StoreResult<u64> {
        let now = self.clock.now();
        self.store.delete_expired_carpools(now).await
    }

    /// Sweep every `interval` until `shutdown` flips to true or its sender
    /// is dropped. A failed cycle is logged and left for the next one.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Expiry sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => match self.sweep_once().await {
                    Ok(0) => tracing::trace!("No expired carpools"),
                    Ok(removed) => tracing::info!(removed, "Swept expired carpools"),
                    Err(e) => tracing::error!(error = %e, "Expiry sweep failed"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Expiry sweeper stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use sea_orm::DbErr;
    use uuid::Uuid;

    use crate::entities::{booking, carpool, rider};
    use crate::store::{
        BookingDraft, CarpoolDraft, JoinOutcome, MemoryStore, SeatedBooking, StoreError,
    };
    use crate::utils::clock::ManualClock;
    use crate::utils::geo::Coordinate;

    async fn open_carpool_at(store: &MemoryStore, created_at: DateTime<Utc>) -> SeatedBooking {
        let rider_id = Uuid::new_v4();
        store
            .ensure_rider(rider::Model {
                id: rider_id,
                username: rider_id.to_string(),
                first_name: "Test".to_string(),
                last_name: "Rider".to_string(),
                email: format!("{}@example.com", rider_id),
                salary: 0,
                created_at,
            })
            .await
            .unwrap();

        let expires_at = created_at + chrono::Duration::seconds(40);
        store
            .open_carpool(
                CarpoolDraft {
                    created_at,
                    expires_at,
                },
                BookingDraft {
                    id: Uuid::new_v4(),
                    rider_id,
                    pickup: Coordinate::new(1.0, 1.0).unwrap(),
                    destination: Coordinate::new(1.2, 1.2).unwrap(),
                    created_at,
                    expires_at,
                    cost: 1.0,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_carpools() {
        let start = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let old = open_carpool_at(&store, start).await;
        let fresh = open_carpool_at(&store, start + chrono::Duration::seconds(30)).await;

        let clock = Arc::new(ManualClock::new(start + chrono::Duration::seconds(41)));
        let sweeper = ExpirySweeper::new(store.clone(), clock, Duration::from_secs(40));

        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);

        let remaining: Vec<i64> = store.carpools().await.iter().map(|c| c.id).collect();
        assert_eq!(remaining, vec![fresh.carpool.id]);
        let bookings = store.bookings().await;
        assert!(bookings.iter().all(|b| b.carpool_id != old.carpool.id));
        assert_eq!(bookings.len(), 1);
    }

    #[tokio::test]
    async fn test_carpool_expiring_exactly_now_survives() {
        let start = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let seated = open_carpool_at(&store, start).await;

        let clock = Arc::new(ManualClock::new(seated.carpool.expires_at));
        let sweeper = ExpirySweeper::new(store.clone(), clock.clone(), Duration::from_secs(40));

        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
        assert_eq!(store.carpools().await.len(), 1);

        clock.advance(chrono::Duration::milliseconds(1));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert!(store.carpools().await.is_empty());
    }

    /// Fails every other sweep, delegating everything else.
    struct FlakyStore {
        inner: MemoryStore,
        sweeps: AtomicUsize,
    }

    #[async_trait]
    impl ActiveBookingStore for FlakyStore {
        async fn find_rider(&self, rider_id: Uuid) -> StoreResult<Option<rider::Model>> {
            self.inner.find_rider(rider_id).await
        }

        async fn ensure_rider(&self, rider: rider::Model) -> StoreResult<bool> {
            self.inner.ensure_rider(rider).await
        }

        async fn update_salary(
            &self,
            rider_id: Uuid,
            salary: i64,
        ) -> StoreResult<Option<rider::Model>> {
            self.inner.update_salary(rider_id, salary).await
        }

        async fn active_bookings(&self, now: DateTime<Utc>) -> StoreResult<Vec<booking::Model>> {
            self.inner.active_bookings(now).await
        }

        async fn active_booking_for_rider(
            &self,
            rider_id: Uuid,
            now: DateTime<Utc>,
        ) -> StoreResult<Option<booking::Model>> {
            self.inner.active_booking_for_rider(rider_id, now).await
        }

        async fn carpools_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<carpool::Model>> {
            self.inner.carpools_by_ids(ids).await
        }

        async fn join_carpool(
            &self,
            carpool_id: i64,
            draft: BookingDraft,
            max_size: i32,
        ) -> StoreResult<JoinOutcome> {
            self.inner.join_carpool(carpool_id, draft, max_size).await
        }

        async fn open_carpool(
            &self,
            carpool: CarpoolDraft,
            draft: BookingDraft,
        ) -> StoreResult<SeatedBooking> {
            self.inner.open_carpool(carpool, draft).await
        }

        async fn delete_expired_carpools(&self, now: DateTime<Utc>) -> StoreResult<u64> {
            if self.sweeps.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                return Err(StoreError::Database(DbErr::Custom("connection reset".into())));
            }
            self.inner.delete_expired_carpools(now).await
        }
    }

    #[tokio::test]
    async fn test_failed_cycle_does_not_stop_sweeper() {
        let start = Utc::now();
        let flaky = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            sweeps: AtomicUsize::new(0),
        });
        open_carpool_at(&flaky.inner, start).await;

        let clock = Arc::new(ManualClock::new(start + chrono::Duration::seconds(41)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle =
            ExpirySweeper::new(flaky.clone(), clock, Duration::from_millis(5)).spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(flaky.sweeps.load(Ordering::SeqCst) >= 2);
        assert!(flaky.inner.carpools().await.is_empty());
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_sender_dropped() {
        let store: Arc<dyn ActiveBookingStore> = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = ExpirySweeper::new(store, clock, Duration::from_secs(3600)).spawn(shutdown_rx);
        drop(shutdown_tx);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
