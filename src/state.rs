//! # Application State
//!
//! Shared state handed to every request handler. Axum clones it per
//! request, which is cheap: the pool is already reference counted and the
//! rest sits behind `Arc`.

use crate::config::Config;
use crate::google::GoogleOAuth;
use crate::session::SessionIssuer;
use anyhow::Result;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;
use webauthn_rs::prelude::*;

/// Shared application state
///
/// Everything here is built once at start-up from [`Config`]; handlers
/// never read configuration directly.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,

    /// WebAuthn relying party: builds challenges and verifies responses
    pub webauthn: Arc<Webauthn>,

    /// How long an issued registration or login challenge stays redeemable
    pub challenge_ttl: chrono::Duration,

    /// Signs and verifies session tokens
    pub sessions: Arc<SessionIssuer>,

    /// Google sign-in, when configured
    pub google: Option<Arc<GoogleOAuth>>,
}

impl AppState {
    /// Connect to the database, run migrations and build the services
    ///
    /// # Errors
    /// Returns an error if the database is unreachable, a migration fails,
    /// or the relying-party settings are malformed.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = SqlitePool::connect(&config.database_url).await?;

        // Migrations are embedded at compile time from ./migrations
        sqlx::migrate!("./migrations").run(&db).await?;

        Self::from_pool(db, config)
    }

    /// Build the state around an existing, migrated pool
    pub fn from_pool(db: SqlitePool, config: &Config) -> Result<Self> {
        config.validate()?;

        // The RP ID must be a registrable suffix of the origin's host
        let rp_origin = Url::parse(&config.rp_origin)?;
        let webauthn = WebauthnBuilder::new(&config.rp_id, &rp_origin)?
            .rp_name(&config.rp_name)
            .build()?;

        let sessions = SessionIssuer::new(
            &config.jwt_secret,
            chrono::Duration::hours(config.session_ttl_hours),
            config.cookie_secure,
        );

        let google = GoogleOAuth::from_config(config)?.map(Arc::new);

        Ok(AppState {
            db,
            webauthn: Arc::new(webauthn),
            challenge_ttl: chrono::Duration::seconds(config.challenge_ttl_secs),
            sessions: Arc::new(sessions),
            google,
        })
    }
}
