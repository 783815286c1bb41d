/// Process configuration, read from the environment exactly once at startup
/// and passed into the pieces that need it. Nothing below `main` reads env
/// vars directly.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: String,
    pub jwt_secret: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    /// Skips signature verification and runs the gateway client offline.
    pub payment_test_mode: bool,
    /// Commission withheld from owner payouts, in whole percent.
    pub platform_fee_percent: i64,
    /// Unpaid bookings older than this are swept and their slot released.
    pub booking_expiry_minutes: i64,
    pub frontend_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:gymslot.db?mode=rwc".into()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT").unwrap_or_else(|_| "3000".into()),
            jwt_secret: std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            razorpay_key_id: std::env::var("RAZORPAY_KEY_ID").unwrap_or_default(),
            razorpay_key_secret: std::env::var("RAZORPAY_KEY_SECRET").unwrap_or_default(),
            payment_test_mode: std::env::var("PAYMENT_TEST_MODE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            platform_fee_percent: std::env::var("PLATFORM_FEE_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            booking_expiry_minutes: std::env::var("BOOKING_EXPIRY_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "https://example.com".into()),
        }
    }
}
