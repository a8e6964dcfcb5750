use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::rider;
use crate::error::{AppError, AppResult};
use crate::utils::geo::Coordinate;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BookRideRequest {
    #[serde(rename = "pickuplat")]
    pub pickup_lat: f64,
    #[serde(rename = "pickuplon")]
    pub pickup_lon: f64,
    #[serde(rename = "destlat")]
    pub dest_lat: f64,
    #[serde(rename = "destlon")]
    pub dest_lon: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRideResponse {
    pub ok: bool,
    pub cost: f64,
    pub booking_id: Uuid,
    pub carpool_id: i64,
    pub carpool_size: i32,
    pub expires_at: DateTime<Utc>,
}

/// Book a ride for the authenticated rider
pub async fn book_ride(
    State(state): State<AppState>,
    Extension(rider): Extension<rider::Model>,
    payload: Result<Json<BookRideRequest>, JsonRejection>,
) -> AppResult<Json<BookRideResponse>> {
    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let pickup = Coordinate::new(payload.pickup_lat, payload.pickup_lon)?;
    let destination = Coordinate::new(payload.dest_lat, payload.dest_lon)?;

    let seated = state.engine.book_ride(&rider, pickup, destination).await?;

    Ok(Json(BookRideResponse {
        ok: true,
        cost: seated.booking.cost,
        booking_id: seated.booking.id,
        carpool_id: seated.carpool.id,
        carpool_size: seated.carpool.size,
        expires_at: seated.booking.expires_at,
    }))
}
