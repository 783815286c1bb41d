use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::availability::load_gym;
use crate::{auth, error::ApiError, models::*, slots, AppState};

/// POST /recurring/set — owner upserts the weekly template for one weekday.
///
/// Start/end times are not validated against each other here; an inverted or
/// unparsable pair simply materializes to zero slots at resolution time.
pub async fn set_recurring_availability(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<SetRecurringRequest>,
) -> Result<Json<ApiResponse<RecurringAvailability>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;
    let day = slots::canonical_day_of_week(&body.day_of_week)
        .ok_or_else(|| ApiError::validation("Invalid day of week"))?;

    let gym = load_gym(&state.db, body.gym_id).await?;
    auth::ensure_gym_owner(&claims, &gym)?;

    let record = sqlx::query_as::<_, RecurringAvailability>(
        "INSERT INTO recurring_availability (gym_id, day_of_week, start_time, end_time)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (gym_id, day_of_week)
         DO UPDATE SET start_time = excluded.start_time, end_time = excluded.end_time
         RETURNING id, gym_id, day_of_week, start_time, end_time",
    )
    .bind(gym.id)
    .bind(day)
    .bind(&body.start_time)
    .bind(&body.end_time)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(ApiResponse::success(record)))
}

/// GET /recurring/get/:gym_id/:day_of_week — owner reads one weekday template.
pub async fn get_recurring_availability(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Path((gym_id, day_of_week)): Path<(i64, String)>,
) -> Result<Json<ApiResponse<RecurringAvailability>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;
    let day = slots::canonical_day_of_week(&day_of_week)
        .ok_or_else(|| ApiError::validation("Invalid day of week"))?;

    let gym = load_gym(&state.db, gym_id).await?;
    auth::ensure_gym_owner(&claims, &gym)?;

    let record = sqlx::query_as::<_, RecurringAvailability>(
        "SELECT id, gym_id, day_of_week, start_time, end_time
         FROM recurring_availability WHERE gym_id = ? AND day_of_week = ?",
    )
    .bind(gym_id)
    .bind(day)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("No recurring availability for this day"))?;

    Ok(Json(ApiResponse::success(record)))
}

// ── Tests ──
