use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Duration, Local, NaiveTime};
use rand::Rng;
use std::sync::Arc;

use super::availability::{claimed_slots, load_gym, parse_date, resolve_availability};
use crate::auth::Role;
use crate::error::{is_unique_violation, ApiError};
use crate::{auth, models::*, slots, AppState};

// ── Constants ──

/// Hourly price charged when a gym has none configured.
const DEFAULT_PRICE_PER_HOUR: i64 = 500;

/// Bookings are accepted for today through this many days ahead, inclusive.
const BOOKING_WINDOW_DAYS: i64 = 2;

const OTP_MIN: i64 = 100_000;
const OTP_MAX: i64 = 999_999;

/// The shared SELECT for booking listings, joined with the gym's name.
const BOOKING_DETAIL_SELECT: &str =
    "SELECT b.id, b.user_id, b.gym_id, g.name AS gym_name, b.date, b.time_slot,
            b.amount, b.order_id, b.payment_id, b.otp, b.otp_expiry,
            b.is_paid, b.is_verified, b.payout_status, b.payout_reference, b.created_at
     FROM bookings b
     JOIN gyms g ON g.id = b.gym_id";

// ── Helpers ──

async fn load_booking(db: &sqlx::SqlitePool, id: i64) -> Result<Booking, ApiError> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))
}

/// Same-day rule: a slot whose start is strictly before the current
/// wall-clock time can no longer be booked.
fn slot_already_started(slot: &str, now: NaiveTime) -> bool {
    slots::parse_time_label(slot).map(|t| t < now).unwrap_or(false)
}

// ── Endpoints ──

/// POST /bookings/initiate — validate the request, create a payment order,
/// persist the booking in its initiated state.
pub async fn initiate_booking(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<InitiateBookingRequest>,
) -> Result<Json<ApiResponse<InitiateBookingResponse>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;

    let date = parse_date(&body.booking_date)?;
    let now = Local::now().naive_local();
    let days_ahead = (date - now.date()).num_days();
    if days_ahead < 0 {
        return Err(ApiError::validation("Booking date is in the past"));
    }
    if days_ahead > BOOKING_WINDOW_DAYS {
        return Err(ApiError::validation(
            "Bookings are only accepted up to 2 days in advance",
        ));
    }

    let time_slot = slots::normalize_slot(&body.time_slot)
        .ok_or_else(|| ApiError::validation("Invalid time slot format"))?;

    if days_ahead == 0 && slot_already_started(&time_slot, now.time()) {
        return Err(ApiError::validation(
            "Cannot book a time slot that has already started",
        ));
    }

    let gym = load_gym(&state.db, body.gym_id).await?;

    let (resolved, _) = resolve_availability(&state.db, gym.id, &body.booking_date)
        .await?
        .ok_or_else(|| ApiError::not_found("No availability found for this date"))?;

    let offered = resolved
        .iter()
        .any(|s| slots::normalize_slot(s).as_deref() == Some(time_slot.as_str()));
    if !offered {
        return Err(ApiError::validation(
            "Requested slot is not available on this date",
        ));
    }

    // Early conflict check; the unique index on (gym_id, date, time_slot)
    // settles any race between two concurrent initiations at insert.
    let claimed = claimed_slots(&state.db, gym.id, &body.booking_date).await?;
    if claimed.iter().any(|c| c == &time_slot) {
        return Err(ApiError::conflict("Slot already booked"));
    }

    let amount = gym.price_per_hour.unwrap_or(DEFAULT_PRICE_PER_HOUR);

    let order_id = state.gateway.create_order(amount).await.map_err(|e| {
        tracing::error!("payment order creation failed for gym {}: {}", gym.id, e);
        ApiError::gateway("Failed to create payment order")
    })?;

    let booking = sqlx::query_as::<_, Booking>(
        "INSERT INTO bookings (user_id, gym_id, date, time_slot, amount, order_id)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING *",
    )
    .bind(claims.sub)
    .bind(gym.id)
    .bind(&body.booking_date)
    .bind(&time_slot)
    .bind(amount)
    .bind(&order_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            // The order created above stays unreferenced at the gateway;
            // reconciliation happens through its dashboard.
            ApiError::conflict("Slot already booked")
        } else {
            ApiError::Database(e)
        }
    })?;

    tracing::info!(
        "booking {} initiated for gym {} on {} at {}",
        booking.id,
        gym.id,
        booking.date,
        booking.time_slot
    );

    Ok(Json(ApiResponse::success(InitiateBookingResponse {
        order_id,
        amount,
        currency: "INR",
        booking,
    })))
}

/// POST /bookings/confirm — verify the gateway callback signature, mark the
/// booking paid, issue the OTP, attempt the owner payout.
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<ConfirmPaymentRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;
    let booking = load_booking(&state.db, body.booking_id).await?;

    if booking.user_id != claims.sub && claims.role != Role::Admin {
        return Err(ApiError::forbidden("Access denied: not your booking"));
    }
    if booking.is_paid {
        return Err(ApiError::validation(
            "Payment already confirmed for this booking",
        ));
    }
    if body.razorpay_order_id != booking.order_id {
        return Err(ApiError::validation(
            "Order reference does not match this booking",
        ));
    }
    if !state.gateway.verify_callback(
        &body.razorpay_order_id,
        &body.razorpay_payment_id,
        &body.razorpay_signature,
    ) {
        return Err(ApiError::validation("Invalid payment signature"));
    }

    let date = parse_date(&booking.date)?;
    let slot_start = slots::slot_start(date, &booking.time_slot)
        .ok_or_else(|| ApiError::validation("Booking has an unparsable time slot"))?;
    let otp = rand::thread_rng().gen_range(OTP_MIN..=OTP_MAX);
    let otp_expiry = slot_start + Duration::hours(1);

    sqlx::query(
        "UPDATE bookings SET is_paid = 1, payment_id = ?, otp = ?, otp_expiry = ? WHERE id = ?",
    )
    .bind(&body.razorpay_payment_id)
    .bind(otp)
    .bind(otp_expiry)
    .bind(booking.id)
    .execute(&state.db)
    .await?;

    tracing::info!("booking {} paid, OTP issued", booking.id);

    // Revenue-share payout. A failure here is reported to the caller but the
    // paid state above is never rolled back; payout_status = 'failed' marks
    // the row for manual reconciliation.
    let gym = load_gym(&state.db, booking.gym_id).await?;
    if let Some(account) = &gym.payout_account_id {
        sqlx::query("UPDATE bookings SET payout_status = 'pending' WHERE id = ?")
            .bind(booking.id)
            .execute(&state.db)
            .await?;

        let share = state.gateway.owner_share(booking.amount);
        match state.gateway.create_transfer(account, share, booking.id).await {
            Ok(transfer_id) => {
                sqlx::query(
                    "UPDATE bookings SET payout_status = 'completed', payout_reference = ?
                     WHERE id = ?",
                )
                .bind(&transfer_id)
                .bind(booking.id)
                .execute(&state.db)
                .await?;
            }
            Err(e) => {
                tracing::error!("payout transfer failed for booking {}: {}", booking.id, e);
                sqlx::query("UPDATE bookings SET payout_status = 'failed' WHERE id = ?")
                    .bind(booking.id)
                    .execute(&state.db)
                    .await?;
                return Err(ApiError::gateway(
                    "Owner payout transfer failed; payment is confirmed",
                ));
            }
        }
    }

    let updated = load_booking(&state.db, booking.id).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// POST /bookings/verify-booking-otp — owner redeems a paying user's OTP on
/// arrival. Rejection precedence: not found, already verified, expired,
/// mismatch.
pub async fn verify_booking_otp(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;

    let booking = match body.booking_id {
        Some(id) => load_booking(&state.db, id).await?,
        None => {
            let unverified = sqlx::query_as::<_, Booking>(
                "SELECT * FROM bookings WHERE otp = ? AND is_paid = 1 AND is_verified = 0
                 ORDER BY id DESC LIMIT 1",
            )
            .bind(body.otp)
            .fetch_optional(&state.db)
            .await?;
            match unverified {
                Some(b) => b,
                // Every holder of this OTP is verified already; fall through
                // to the already-verified rejection rather than not-found.
                None => sqlx::query_as::<_, Booking>(
                    "SELECT * FROM bookings WHERE otp = ? AND is_paid = 1 ORDER BY id DESC LIMIT 1",
                )
                .bind(body.otp)
                .fetch_optional(&state.db)
                .await?
                .ok_or_else(|| ApiError::not_found("No booking found for this OTP"))?,
            }
        }
    };

    let gym = load_gym(&state.db, booking.gym_id).await?;
    auth::ensure_gym_owner(&claims, &gym)?;

    if booking.is_verified {
        return Err(ApiError::validation("Booking already verified"));
    }
    if !booking.is_paid {
        return Err(ApiError::validation("Booking is not paid yet"));
    }
    let expiry = booking
        .otp_expiry
        .ok_or_else(|| ApiError::validation("Booking has no OTP issued"))?;
    if Local::now().naive_local() > expiry {
        return Err(ApiError::validation("OTP has expired"));
    }
    if booking.otp != Some(body.otp) {
        return Err(ApiError::validation("OTP does not match"));
    }

    sqlx::query("UPDATE bookings SET is_verified = 1 WHERE id = ?")
        .bind(booking.id)
        .execute(&state.db)
        .await?;

    tracing::info!("booking {} verified", booking.id);

    let updated = load_booking(&state.db, booking.id).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /bookings/:id — cancel by deleting the row, releasing its slot
/// claim. Verified bookings can no longer be cancelled. No refunds here.
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;
    let booking = load_booking(&state.db, id).await?;

    if booking.user_id != claims.sub && claims.role != Role::Admin {
        return Err(ApiError::forbidden("Access denied: not your booking"));
    }
    if booking.is_verified {
        return Err(ApiError::validation("Cannot cancel a verified booking"));
    }

    sqlx::query("DELETE FROM bookings WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    tracing::info!("booking {} cancelled", id);

    Ok(Json(ApiResponse::success(booking)))
}

/// GET /bookings/my-bookings — the caller's own bookings, newest first.
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<Json<ApiResponse<Vec<BookingDetail>>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;

    let query = format!(
        "{} WHERE b.user_id = ? ORDER BY b.created_at DESC, b.id DESC",
        BOOKING_DETAIL_SELECT
    );
    let bookings = sqlx::query_as::<_, BookingDetail>(&query)
        .bind(claims.sub)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(ApiResponse::success(bookings)))
}

/// GET /bookings/all-bookings — bookings across every gym the caller owns.
pub async fn owner_bookings(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<Json<ApiResponse<Vec<BookingDetail>>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;
    auth::ensure_gym_owner_role(&claims)?;

    let query = format!(
        "{} WHERE g.owner_id = ? ORDER BY b.created_at DESC, b.id DESC",
        BOOKING_DETAIL_SELECT
    );
    let bookings = sqlx::query_as::<_, BookingDetail>(&query)
        .bind(claims.sub)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(ApiResponse::success(bookings)))
}

/// GET /bookings/all — every booking on the platform, admin only.
pub async fn all_bookings(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<Json<ApiResponse<Vec<BookingDetail>>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;
    auth::ensure_admin(&claims)?;

    let query = format!(
        "{} ORDER BY b.created_at DESC, b.id DESC",
        BOOKING_DETAIL_SELECT
    );
    let bookings = sqlx::query_as::<_, BookingDetail>(&query)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(ApiResponse::success(bookings)))
}

// ── Background sweep ──

/// Delete initiated bookings older than `max_age_minutes`, releasing their
/// slot claim for other callers.
pub async fn expire_unpaid_bookings(db: &sqlx::SqlitePool, max_age_minutes: i64) {
    let result = sqlx::query(
        "DELETE FROM bookings
         WHERE is_paid = 0
         AND datetime(created_at, '+' || ? || ' minutes') < datetime('now', 'localtime')",
    )
    .bind(max_age_minutes)
    .execute(db)
    .await;

    match result {
        Ok(r) if r.rows_affected() > 0 => {
            tracing::info!("Expired {} unpaid bookings", r.rows_affected());
        }
        Ok(_) => {}
        Err(e) => tracing::error!("Failed to expire unpaid bookings: {}", e),
    }
}

// ── Tests ──
