use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::availability::load_gym;
use crate::{auth, error::ApiError, models::*, AppState};

/// POST /gyms — admin onboards a gym with the fields the booking core reads.
pub async fn create_gym(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<CreateGymRequest>,
) -> Result<Json<ApiResponse<Gym>>, ApiError> {
    let claims = state.auth.authenticate(&headers)?;
    auth::ensure_admin(&claims)?;

    if body.name.trim().is_empty() {
        return Err(ApiError::validation("Gym name must not be empty"));
    }

    let gym = sqlx::query_as::<_, Gym>(
        "INSERT INTO gyms (name, owner_id, price_per_hour, payout_account_id)
         VALUES (?, ?, ?, ?)
         RETURNING id, name, owner_id, price_per_hour, payout_account_id, created_at",
    )
    .bind(body.name.trim())
    .bind(body.owner_id)
    .bind(body.price_per_hour)
    .bind(&body.payout_account_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(ApiResponse::success(gym)))
}

/// GET /gyms/:id — public read of a single gym record.
pub async fn get_gym(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Gym>>, ApiError> {
    let gym = load_gym(&state.db, id).await?;
    Ok(Json(ApiResponse::success(gym)))
}

// ── Tests ──
