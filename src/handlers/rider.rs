use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::rider;
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RiderInfo {
    pub id: Uuid,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub salary: i64,
}

impl From<rider::Model> for RiderInfo {
    fn from(r: rider::Model) -> Self {
        Self {
            id: r.id,
            username: r.username,
            firstname: r.first_name,
            lastname: r.last_name,
            email: r.email,
            salary: r.salary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RiderResponse {
    pub ok: bool,
    pub rider: RiderInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSalaryRequest {
    pub new_salary: i64,
}

/// Current rider profile
pub async fn me(Extension(rider): Extension<rider::Model>) -> Json<RiderResponse> {
    Json(RiderResponse {
        ok: true,
        rider: rider.into(),
    })
}

/// Update the salary used for pricing future bookings
pub async fn update_salary(
    State(state): State<AppState>,
    Extension(rider): Extension<rider::Model>,
    payload: Result<Json<UpdateSalaryRequest>, JsonRejection>,
) -> AppResult<Json<serde_json::Value>> {
    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    if payload.new_salary < 0 {
        return Err(AppError::Validation("Salary cannot be negative".to_string()));
    }

    state
        .store
        .update_salary(rider.id, payload.new_salary)
        .await?
        .ok_or_else(|| AppError::NotFound("Rider not found".to_string()))?;

    tracing::info!(rider_id = %rider.id, "Salary updated");
    Ok(Json(serde_json::json!({ "ok": true })))
}
