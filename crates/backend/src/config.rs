use anyhow::{Context, Result};
use std::str::FromStr;

/// Runtime configuration, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// Base URL used when building cancel links
    pub public_base_url: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    /// Base64-encoded 32-byte AES key for refresh tokens at rest
    pub token_encryption_key: String,
    pub booking: BookingConfig,
    pub rate_limit: RateLimitConfig,
    pub cors_allowed_origins: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct BookingConfig {
    pub min_notice_minutes: i64,
    pub default_days_ahead: u32,
    pub max_days_ahead: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            min_notice_minutes: 60,
            default_days_ahead: 14,
            max_days_ahead: 60,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window_secs: i64,
    pub max_requests: usize,
    pub monthly_limit: i64,
    pub usage_cache_ttl_secs: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 10,
            max_requests: 5,
            monthly_limit: 100_000,
            usage_cache_ttl_secs: 60,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let booking_defaults = BookingConfig::default();
        let limit_defaults = RateLimitConfig::default();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            port: parsed_or("PORT", 3000)?,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            token_encryption_key: required("TOKEN_ENCRYPTION_KEY")?,
            booking: BookingConfig {
                min_notice_minutes: parsed_or(
                    "MIN_NOTICE_MINUTES",
                    booking_defaults.min_notice_minutes,
                )?,
                default_days_ahead: parsed_or(
                    "DEFAULT_DAYS_AHEAD",
                    booking_defaults.default_days_ahead,
                )?,
                max_days_ahead: parsed_or("MAX_DAYS_AHEAD", booking_defaults.max_days_ahead)?,
            },
            rate_limit: RateLimitConfig {
                window_secs: parsed_or("RATE_LIMIT_WINDOW_SECS", limit_defaults.window_secs)?,
                max_requests: parsed_or("RATE_LIMIT_MAX_REQUESTS", limit_defaults.max_requests)?,
                monthly_limit: parsed_or("MONTHLY_API_LIMIT", limit_defaults.monthly_limit)?,
                usage_cache_ttl_secs: parsed_or(
                    "USAGE_CACHE_TTL_SECS",
                    limit_defaults.usage_cache_ttl_secs,
                )?,
            },
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS").ok(),
        })
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} must be set", name))
}

fn parsed_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
