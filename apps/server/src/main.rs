mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod payments;
mod rate_limit;
mod slots;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use rate_limit::{
    rate_limit_booking, rate_limit_owner, rate_limit_public, rate_limit_user, RateLimitConfig,
    RateLimiter,
};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub auth: auth::AuthGate,
    pub gateway: payments::PaymentGateway,
    pub started_at: Instant,
}

/// Unpaid-booking expiry check interval (seconds).
const BOOKING_EXPIRY_INTERVAL_SECS: u64 = 300;
/// Past-availability purge interval (seconds).
const AVAILABILITY_PURGE_INTERVAL_SECS: u64 = 86400;
/// Rate limit cleanup interval (seconds).
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::from_env();

    // ── Tracing ──
    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.razorpay_key_id.is_empty() && !config.payment_test_mode {
        tracing::warn!("RAZORPAY_KEY_ID not set — payment gateway runs offline");
    }

    // ── Database ──
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    db::run_migrations(&pool).await?;

    let state = Arc::new(AppState {
        db: pool,
        auth: auth::AuthGate::new(&config.jwt_secret),
        gateway: payments::PaymentGateway::new(&config),
        started_at: Instant::now(),
    });

    // ── Background task: expire unpaid bookings, releasing their slots ──
    let expire_db = state.db.clone();
    let expiry_minutes = config.booking_expiry_minutes;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(BOOKING_EXPIRY_INTERVAL_SECS));
        loop {
            interval.tick().await;
            handlers::booking::expire_unpaid_bookings(&expire_db, expiry_minutes).await;
        }
    });

    // ── Background task: purge past date-availability records daily ──
    let purge_db = state.db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(
            AVAILABILITY_PURGE_INTERVAL_SECS,
        ));
        loop {
            // First tick fires immediately, so the purge also runs at startup.
            interval.tick().await;
            handlers::availability::purge_past_availability(&purge_db).await;
        }
    });

    // ── Rate limiter ──
    let rate_limiter = build_rate_limiter();

    // ── Background task: cleanup stale rate limit entries ──
    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    // ── CORS: whitelist FRONTEND_URL when configured, otherwise allow any ──
    let cors = if config.frontend_url != "https://example.com" {
        let origins: Vec<axum::http::HeaderValue> = vec![
            config
                .frontend_url
                .parse()
                .expect("FRONTEND_URL must be a valid URL"),
            "http://localhost:5173".parse().unwrap(), // Vite dev server
        ];
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = build_router(state, rate_limiter)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Gymslot server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn build_rate_limiter() -> RateLimiter {
    let rate_limiter = RateLimiter::new();
    rate_limiter.add_tier(
        "public",
        RateLimitConfig {
            max_requests: 60,
            window: Duration::from_secs(60),
        },
    );
    rate_limiter.add_tier(
        "booking",
        RateLimitConfig {
            max_requests: 5,
            window: Duration::from_secs(300),
        },
    );
    rate_limiter.add_tier(
        "user",
        RateLimitConfig {
            max_requests: 30,
            window: Duration::from_secs(60),
        },
    );
    rate_limiter.add_tier(
        "owner",
        RateLimitConfig {
            max_requests: 120,
            window: Duration::from_secs(60),
        },
    );
    rate_limiter
}

/// Route table: every operation mounts under `/api`; only the health probe
/// stays top-level. Five groups with per-group rate limits.
fn build_router(state: Arc<AppState>, rate_limiter: RateLimiter) -> Router {
    // 1. No-limit: health checks
    let no_limit_routes = Router::new().route("/healthz", get(handlers::health::health));

    // 2. Public: read-only endpoints (no auth, 60 req/min)
    let public_routes = Router::new()
        .route(
            "/api/availability/get/{gym_id}",
            get(handlers::availability::get_resolved_availability),
        )
        .route(
            "/api/availability/user/{gym_id}/all",
            get(handlers::availability::list_future_availability),
        )
        .route("/api/gyms/{id}", get(handlers::gym::get_gym))
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_public));

    // 3. Booking creation/payment: strictest limit (5 req/5min)
    let booking_routes = Router::new()
        .route(
            "/api/bookings/initiate",
            post(handlers::booking::initiate_booking),
        )
        .route(
            "/api/bookings/confirm",
            post(handlers::booking::confirm_payment),
        )
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_booking));

    // 4. Authenticated user endpoints (30 req/min)
    let user_routes = Router::new()
        .route(
            "/api/bookings/my-bookings",
            get(handlers::booking::my_bookings),
        )
        .route(
            "/api/bookings/{id}",
            delete(handlers::booking::cancel_booking),
        )
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_user));

    // 5. Owner/admin management endpoints (120 req/min)
    let owner_routes = Router::new()
        .route(
            "/api/availability/set",
            post(handlers::availability::set_date_availability),
        )
        .route(
            "/api/availability/owner/{gym_id}/all",
            get(handlers::availability::list_owner_availability),
        )
        .route(
            "/api/availability/admin/{gym_id}/all",
            get(handlers::availability::list_admin_availability),
        )
        .route(
            "/api/recurring/set",
            post(handlers::recurring::set_recurring_availability),
        )
        .route(
            "/api/recurring/get/{gym_id}/{day_of_week}",
            get(handlers::recurring::get_recurring_availability),
        )
        .route(
            "/api/bookings/verify-booking-otp",
            post(handlers::booking::verify_booking_otp),
        )
        .route(
            "/api/bookings/all-bookings",
            get(handlers::booking::owner_bookings),
        )
        .route("/api/bookings/all", get(handlers::booking::all_bookings))
        .route("/api/gyms", post(handlers::gym::create_gym))
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_owner));

    Router::new()
        .merge(no_limit_routes)
        .merge(public_routes)
        .merge(booking_routes)
        .merge(user_routes)
        .merge(owner_routes)
        .with_state(state)
}

/// Fresh state over an in-memory database, with the payment gateway offline
/// and an enforcing HMAC verifier so signature paths stay testable.
#[cfg(test)]
pub async fn test_state() -> Arc<AppState> {
    Arc::new(AppState {
        db: db::test_pool().await,
        auth: auth::AuthGate::new("test-secret"),
        gateway: payments::PaymentGateway::with_verifier(
            payments::SignatureVerifier::Hmac {
                secret: "gateway-secret".into(),
            },
            20,
        ),
        started_at: Instant::now(),
    })
}

// ── Tests ──
