use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

mod clock;
mod config;
mod crypto;
mod db;
pub mod error;
mod google;
mod handlers;
mod models;
pub mod repository;
mod schema;
mod services;
mod tz;

use clock::SystemClock;
use config::AppConfig;
use crypto::TokenCipher;
use google::GoogleCalendarClient;
use handlers::AppState;
use repository::PgStore;
use services::rate_limit::RateLimiter;
use services::BookingService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,teamslot_backend=debug")),
        )
        .init();

    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = AppConfig::from_env()?;

    // Establish database connection pool
    let pool = db::establish_connection_pool(&config.database_url)?;
    let store = PgStore::new(pool);

    let cipher = TokenCipher::from_base64_key(&config.token_encryption_key)?;
    let calendar = GoogleCalendarClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        cipher,
    )?;

    let clock = Arc::new(SystemClock);
    let service = BookingService::new(
        Arc::new(store.clone()),
        Arc::new(calendar),
        RateLimiter::new(config.rate_limit, clock.clone()),
        clock,
        config.booking,
        config.public_base_url.clone(),
    );

    let state = AppState {
        service: Arc::new(service),
        store,
    };

    // Bound the per-IP map even when traffic is idle
    let sweeper = state.service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            sweeper.rate_limiter().prune();
        }
    });

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api/public/event-types/:id/availability",
            get(handlers::get_availability),
        )
        .route("/api/public/bookings", post(handlers::create_booking))
        .route(
            "/api/public/bookings/cancel",
            post(handlers::cancel_booking),
        )
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(config.cors_allowed_origins.as_deref()))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build CORS layer based on environment configuration.
///
/// If CORS_ALLOWED_ORIGINS is set, only those origins are allowed.
/// If not set, defaults to permissive CORS (for development only).
fn build_cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    match allowed_origins {
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                tracing::warn!(
                    "CORS_ALLOWED_ORIGINS is set but empty, using permissive CORS (not recommended for production)"
                );
                CorsLayer::permissive()
            } else {
                tracing::info!("CORS configured for origins: {:?}", origins);
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::warn!(
                "CORS_ALLOWED_ORIGINS not set, using permissive CORS (not recommended for production)"
            );
            CorsLayer::permissive()
        }
    }
}
