use std::collections::BTreeSet;

use chrono::Duration;

use crate::error::AppResult;
use crate::store::{ActiveBookingStore, BookingDraft, CarpoolDraft, JoinOutcome, SeatedBooking};

/// Seats a priced booking into the first open candidate carpool with room,
/// or into a new carpool when none has room.
#[derive(Debug, Clone)]
pub struct CarpoolAssigner {
    max_carpool_size: i32,
    carpool_timeout: Duration,
}

impl CarpoolAssigner {
    pub fn new(max_carpool_size: i32, carpool_timeout: Duration) -> Self {
        Self {
            max_carpool_size,
            carpool_timeout,
        }
    }

    /// Candidates are tried in ascending id order so the same snapshot
    /// always yields the same carpool. The snapshot only narrows the search;
    /// capacity is decided by the store under lock.
    pub async fn assign(
        &self,
        store: &dyn ActiveBookingStore,
        candidates: &BTreeSet<i64>,
        draft: BookingDraft,
    ) -> AppResult<SeatedBooking> {
        let now = draft.created_at;
        let ids: Vec<i64> = candidates.iter().copied().collect();

        let mut snapshot = store.carpools_by_ids(&ids).await?;
        snapshot.sort_by_key(|c| c.id);

        for carpool in snapshot
            .iter()
            .filter(|c| c.is_active(now) && c.has_free_seat(self.max_carpool_size))
        {
            match store
                .join_carpool(carpool.id, draft.clone(), self.max_carpool_size)
                .await?
            {
                JoinOutcome::Seated(seated) => {
                    tracing::debug!(
                        carpool_id = seated.carpool.id,
                        size = seated.carpool.size,
                        rider_id = %seated.booking.rider_id,
                        "Joined existing carpool"
                    );
                    return Ok(seated);
                }
                JoinOutcome::Full => {
                    tracing::debug!(carpool_id = carpool.id, "Carpool filled up, trying next");
                }
                JoinOutcome::Closed => {
                    tracing::debug!(carpool_id = carpool.id, "Carpool closed, trying next");
                }
            }
        }

        let window = CarpoolDraft {
            created_at: now,
            expires_at: now + self.carpool_timeout,
        };
        let seated = store.open_carpool(window, draft).await?;
        tracing::debug!(
            carpool_id = seated.carpool.id,
            rider_id = %seated.booking.rider_id,
            "Opened new carpool"
        );
        Ok(seated)
    }
}
