use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::ActiveBookingStore;

/// Reject a request early when the rider already holds an active booking.
///
/// This is a fast path only. The store repeats the check under lock inside
/// the seat reservation, which is what stops two concurrent requests from
/// the same rider both getting through.
pub async fn ensure_no_active_booking(
    store: &dyn ActiveBookingStore,
    rider_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<()> {
    match store.active_booking_for_rider(rider_id, now).await? {
        Some(existing) => {
            tracing::debug!(
                rider_id = %rider_id,
                booking_id = %existing.id,
                "Rider already has an active booking"
            );
            Err(AppError::Conflict(
                "rider already has an active booking".to_string(),
            ))
        }
        None => Ok(()),
    }
}
