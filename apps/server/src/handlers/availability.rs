use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use sqlx::types::Json as DbJson;
use std::sync::Arc;

use crate::{auth, error::ApiError, models::*, slots, AppState};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ── Shared helpers (pub(crate) for booking.rs) ──

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn today_string() -> String {
    today().format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| ApiError::validation("Invalid date format, expected YYYY-MM-DD"))
}

pub async fn load_gym(db: &sqlx::SqlitePool, gym_id: i64) -> Result<Gym, ApiError> {
    sqlx::query_as::<_, Gym>(
        "SELECT id, name, owner_id, price_per_hour, payout_account_id, created_at
         FROM gyms WHERE id = ?",
    )
    .bind(gym_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Gym not found"))
}

/// Resolve the slot list for one (gym, date). A stored date record wins
/// verbatim; otherwise the weekly template for that weekday is materialized
/// through the generator. None means neither exists.
pub async fn resolve_availability(
    db: &sqlx::SqlitePool,
    gym_id: i64,
    date: &str,
) -> Result<Option<(Vec<String>, &'static str)>, ApiError> {
    let explicit = sqlx::query_as::<_, DateAvailability>(
        "SELECT id, gym_id, date, slots FROM date_availability WHERE gym_id = ? AND date = ?",
    )
    .bind(gym_id)
    .bind(date)
    .fetch_optional(db)
    .await?;

    if let Some(record) = explicit {
        return Ok(Some((record.slots.0, "explicit")));
    }

    let day = match NaiveDate::parse_from_str(date, DATE_FORMAT) {
        Ok(d) => slots::weekday_name(d),
        Err(_) => return Ok(None),
    };

    let recurring = sqlx::query_as::<_, RecurringAvailability>(
        "SELECT id, gym_id, day_of_week, start_time, end_time
         FROM recurring_availability WHERE gym_id = ? AND day_of_week = ?",
    )
    .bind(gym_id)
    .bind(day)
    .fetch_optional(db)
    .await?;

    Ok(recurring.map(|r| (slots::generate_slots(&r.start_time, &r.end_time), "recurring")))
}

/// Slots held by a live booking row for this (gym, date). Cancellation
/// deletes the row, so every stored booking counts as a claim.
pub async fn claimed_slots(
    db: &sqlx::SqlitePool,
    gym_id: i64,
    date: &str,
) -> Result<Vec<String>, ApiError> {
    Ok(sqlx::query_scalar(
        "SELECT time_slot FROM bookings WHERE gym_id = ? AND date = ?",
    )
    .bind(gym_id)
    .bind(date)
    .fetch_all(db)
    .await?)
}

pub fn subtract_claimed(resolved: Vec<String>, claimed: &[String]) -> Vec<String> {
    resolved
        .into_iter()
        .filter(|s| !claimed.iter().any(|c| c == s))
        .collect()
}

async fn availability_overview(
    db: &sqlx::SqlitePool,
    gym_id: i64,
    future_only: bool,
) -> Result<AvailabilityOverview, ApiError> {
    let date_specific = if future_only {
        sqlx::query_as::<_, DateAvailability>(
            "SELECT id, gym_id, date, slots FROM date_availability
             WHERE gym_id = ? AND date >= ? ORDER BY date ASC",
        )
        .bind(gym_id)
        .bind(today_string())
        .fetch_all(db)
        .await?
    } else {
        sqlx::query_as::<_, DateAvailability>(
            "SELECT id, gym_id, date, slots FROM date_availability
             WHERE gym_id = ? ORDER BY date ASC",
        )
        .bind(gym_id)
        .fetch_all(db)
        .await?
    };

    let recurring = sqlx::query_as::<_, RecurringAvailability>(
        "SELECT id, gym_id, day_of_week, start_time, end_time
         FROM recurring_availability WHERE gym_id = ? ORDER BY id ASC",
    )
    .bind(gym_id)
    .fetch_all(db)
    .await?;

    Ok(AvailabilityOverview {
        date_specific,
        recurring,
    })
}

// ── Endpoints ──

/// POST /availability/set — owner replaces the slot list for one date.
pub async fn set_date_availability(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<SetAvailabilityRequest>,
) -> Result<Json<ApiResponse<DateAvailability>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;
    let date = parse_date(&body.date)?;
    if date < today() {
        return Err(ApiError::validation(
            "Cannot set availability for a past date",
        ));
    }

    let gym = load_gym(&state.db, body.gym_id).await?;
    auth::ensure_gym_owner(&claims, &gym)?;

    // Invalid or inverted open hours come out as an empty list, not an error.
    let slots = slots::generate_slots(&body.start_time, &body.end_time);

    let record = sqlx::query_as::<_, DateAvailability>(
        "INSERT INTO date_availability (gym_id, date, slots) VALUES (?, ?, ?)
         ON CONFLICT (gym_id, date) DO UPDATE SET slots = excluded.slots
         RETURNING id, gym_id, date, slots",
    )
    .bind(gym.id)
    .bind(&body.date)
    .bind(DbJson(slots))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(ApiResponse::success(record)))
}

/// GET /availability/get/:gym_id?date=YYYY-MM-DD — resolved slots for a date
/// (defaults to today), minus slots already claimed by a live booking.
pub async fn get_resolved_availability(
    State(state): State<Arc<AppState>>,
    Path(gym_id): Path<i64>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<ResolvedAvailability>>, ApiError> {
    let date = match query.date {
        Some(d) => {
            parse_date(&d)?;
            d
        }
        None => today_string(),
    };

    load_gym(&state.db, gym_id).await?;

    let (resolved, source) = resolve_availability(&state.db, gym_id, &date)
        .await?
        .ok_or_else(|| ApiError::not_found("No availability found for this date"))?;

    let claimed = claimed_slots(&state.db, gym_id, &date).await?;
    let available_slots = subtract_claimed(resolved, &claimed);

    Ok(Json(ApiResponse::success(ResolvedAvailability {
        gym_id,
        date,
        available_slots,
        source,
    })))
}

/// GET /availability/owner/:gym_id/all — every date record plus the weekly
/// templates, for the gym's owner.
pub async fn list_owner_availability(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Path(gym_id): Path<i64>,
) -> Result<Json<ApiResponse<AvailabilityOverview>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;
    let gym = load_gym(&state.db, gym_id).await?;
    auth::ensure_gym_owner(&claims, &gym)?;

    let overview = availability_overview(&state.db, gym_id, false).await?;
    Ok(Json(ApiResponse::success(overview)))
}

/// GET /availability/admin/:gym_id/all — admin mirror of the owner listing.
pub async fn list_admin_availability(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Path(gym_id): Path<i64>,
) -> Result<Json<ApiResponse<AvailabilityOverview>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;
    auth::ensure_admin(&claims)?;
    load_gym(&state.db, gym_id).await?;

    let overview = availability_overview(&state.db, gym_id, false).await?;
    Ok(Json(ApiResponse::success(overview)))
}

/// GET /availability/user/:gym_id/all — public listing; past dates are never
/// shown to booking users.
pub async fn list_future_availability(
    State(state): State<Arc<AppState>>,
    Path(gym_id): Path<i64>,
) -> Result<Json<ApiResponse<AvailabilityOverview>>, ApiError> {
    load_gym(&state.db, gym_id).await?;

    let overview = availability_overview(&state.db, gym_id, true).await?;
    Ok(Json(ApiResponse::success(overview)))
}

// ── Background sweep ──

/// Delete date records strictly before today. Runs at startup and daily.
pub async fn purge_past_availability(db: &sqlx::SqlitePool) {
    match sqlx::query("DELETE FROM date_availability WHERE date < date('now', 'localtime')")
        .execute(db)
        .await
    {
        Ok(result) if result.rows_affected() > 0 => {
            tracing::info!(
                "Purged {} past availability records",
                result.rows_affected()
            );
        }
        Ok(_) => {}
        Err(e) => tracing::error!("Failed to purge past availability: {}", e),
    }
}

// ── Tests ──
