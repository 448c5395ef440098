//! # Blog Auth Server
//!
//! Account and passkey authentication for the blogging backend.
//!
//! Users sign up with a username and password (or through Google), then
//! enroll passkeys (WebAuthn credentials) and use them to log in. Every
//! successful login sets an HTTP-only `token` cookie holding a signed session
//! token.

mod accounts;
mod config;
mod db;
mod error;
mod google;
mod handlers;
mod middleware;
mod routes;
mod session;
mod state;
mod webauthn;

#[cfg(test)]
mod testing;

use crate::config::Config;
use crate::state::AppState;
use axum::http::{header, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired challenges are swept
const CHALLENGE_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,blog_auth_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded: {:?}", config);

    let app_state = AppState::new(&config).await?;
    tracing::info!(
        rp_id = %config.rp_id,
        google = app_state.google.is_some(),
        "Application state initialized"
    );

    let cleanup_pool = app_state.db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHALLENGE_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match db::challenges::cleanup_expired(&cleanup_pool).await {
                Ok(0) => {}
                Ok(deleted) => tracing::debug!(deleted, "expired challenges removed"),
                Err(e) => tracing::error!("Challenge cleanup failed: {:?}", e),
            }
        }
    });

    let app = routes::router(app_state).layer(cors_layer(&config)?);

    let bind_addr = config.bind_address();
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// The session cookie only crosses origins when a frontend origin is
/// configured; otherwise any origin may call, without credentials.
fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let layer = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(HeaderValue::from_str(origin)?)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    Ok(layer)
}
