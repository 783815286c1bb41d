use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

// ── Database models ──

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Gym {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub price_per_hour: Option<i64>,
    pub payout_account_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DateAvailability {
    pub id: i64,
    pub gym_id: i64,
    pub date: String,
    pub slots: Json<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RecurringAvailability {
    pub id: i64,
    pub gym_id: i64,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub gym_id: i64,
    pub date: String,
    pub time_slot: String,
    pub amount: i64,
    pub order_id: String,
    pub payment_id: Option<String>,
    pub otp: Option<i64>,
    pub otp_expiry: Option<NaiveDateTime>,
    pub is_paid: bool,
    pub is_verified: bool,
    pub payout_status: String,
    pub payout_reference: Option<String>,
    pub created_at: String,
}

/// Booking row joined with the gym's name, for listing endpoints.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookingDetail {
    pub id: i64,
    pub user_id: i64,
    pub gym_id: i64,
    pub gym_name: String,
    pub date: String,
    pub time_slot: String,
    pub amount: i64,
    pub order_id: String,
    pub payment_id: Option<String>,
    pub otp: Option<i64>,
    pub otp_expiry: Option<NaiveDateTime>,
    pub is_paid: bool,
    pub is_verified: bool,
    pub payout_status: String,
    pub payout_reference: Option<String>,
    pub created_at: String,
}

// ── API request/response types ──

#[derive(Debug, Deserialize)]
pub struct SetAvailabilityRequest {
    pub gym_id: i64,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
}

/// Slot list resolved for one (gym, date), with its source:
/// "explicit" for a stored date record, "recurring" for a weekly template.
#[derive(Debug, Serialize)]
pub struct ResolvedAvailability {
    pub gym_id: i64,
    pub date: String,
    pub available_slots: Vec<String>,
    pub source: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityOverview {
    pub date_specific: Vec<DateAvailability>,
    pub recurring: Vec<RecurringAvailability>,
}

#[derive(Debug, Deserialize)]
pub struct SetRecurringRequest {
    pub gym_id: i64,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Deserialize)]
pub struct InitiateBookingRequest {
    pub gym_id: i64,
    pub booking_date: String,
    pub time_slot: String,
}

#[derive(Debug, Serialize)]
pub struct InitiateBookingResponse {
    pub booking: Booking,
    pub order_id: String,
    pub amount: i64,
    pub currency: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub booking_id: i64,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: i64,
    pub booking_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGymRequest {
    pub name: String,
    pub owner_id: i64,
    pub price_per_hour: Option<i64>,
    pub payout_account_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
