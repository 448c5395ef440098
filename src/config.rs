//! # Configuration Management
//!
//! Configuration comes from the environment ("12-factor app"), optionally
//! seeded from a `.env` file.
//!
//! ## Environment Variables
//! - `HOST`: Server bind address (default: 127.0.0.1)
//! - `PORT`: Server port (default: 8080)
//! - `DATABASE_URL`: SQLite database connection string
//! - `RP_ID`: WebAuthn Relying Party ID (usually your domain)
//! - `RP_ORIGIN`: WebAuthn Relying Party Origin (full URL of the frontend)
//! - `RP_NAME`: Human-readable name for your service
//! - `JWT_SECRET`: HMAC secret for session tokens (required)
//! - `SESSION_TTL_HOURS`: Session token and cookie lifetime (default: 72)
//! - `COOKIE_SECURE`: Mark the session cookie `Secure` (default: false)
//! - `CHALLENGE_TTL_SECS`: Lifetime of a WebAuthn challenge (default: 300)
//! - `CORS_ORIGIN`: Frontend origin allowed to send credentialed requests
//! - `FRONTEND_URL`: Where Google sign-in sends the browser afterwards
//!   (default: http://localhost:5173)
//! - `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`: enable Google sign-in
//! - `GOOGLE_REDIRECT_URL`: OAuth callback registered with Google
//!   (default: http://localhost:8080/users/auth/google/callback)

use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use std::env;
use std::ops::RangeInclusive;

/// Accepted `SESSION_TTL_HOURS`: one hour to one year
pub const SESSION_TTL_HOURS: RangeInclusive<i64> = 1..=8_760;

/// Accepted `CHALLENGE_TTL_SECS`: one second to one day
pub const CHALLENGE_TTL_SECS: RangeInclusive<i64> = 1..=86_400;

/// Application configuration
///
/// `jwt_secret` is a [`SecretString`], so printing the config with `{:?}`
/// never leaks it into the logs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host/IP address to bind to
    pub host: String,

    /// Server port number
    pub port: u16,

    /// SQLite database connection URL
    /// Format: "sqlite:filename.db?mode=rwc" (read, write, create)
    pub database_url: String,

    /// WebAuthn Relying Party ID, the bare domain ("localhost", "example.com")
    pub rp_id: String,

    /// WebAuthn Relying Party Origin, scheme + host + port of the page that
    /// runs the WebAuthn ceremony ("http://localhost:5173")
    pub rp_origin: String,

    /// Human-readable name shown by the authenticator during passkey creation
    pub rp_name: String,

    /// Secret used to sign session tokens
    pub jwt_secret: SecretString,

    /// Lifetime of a session token (and of the cookie carrying it)
    pub session_ttl_hours: i64,

    /// Whether the session cookie is flagged `Secure`
    pub cookie_secure: bool,

    /// Lifetime of an issued registration or login challenge
    pub challenge_ttl_secs: i64,

    /// Origin allowed to make credentialed cross-origin calls.
    /// `None` falls back to a permissive, credential-less CORS policy.
    pub cors_origin: Option<String>,

    /// Base URL of the frontend; Google sign-in redirects back into it
    pub frontend_url: String,

    /// Google OAuth client, `None` when Google sign-in is disabled
    pub google: Option<GoogleConfig>,
}

/// OAuth client registered with Google
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,

    /// Callback URL, must match the one registered with Google
    pub redirect_url: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Falls back to development defaults for everything except
    /// `JWT_SECRET`. Returns an error if a numeric or boolean variable
    /// does not parse or a lifetime is out of range.
    ///
    /// ## Example .env file
    /// ```text
    /// HOST=127.0.0.1
    /// PORT=8080
    /// DATABASE_URL=sqlite:passkey.db?mode=rwc
    /// RP_ID=localhost
    /// RP_ORIGIN=http://localhost:5173
    /// RP_NAME=My Localhost Machine
    /// JWT_SECRET=change-me
    /// ```
    pub fn from_env() -> Result<Self> {
        // dotenvy doesn't error if the file is missing
        dotenvy::dotenv().ok();

        let config = Config {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),

            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid port number")?,

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:passkey.db?mode=rwc".to_string()),

            rp_id: env::var("RP_ID").unwrap_or_else(|_| "localhost".to_string()),

            rp_origin: env::var("RP_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            rp_name: env::var("RP_NAME").unwrap_or_else(|_| "My Localhost Machine".to_string()),

            jwt_secret: env::var("JWT_SECRET")
                .context("JWT_SECRET must be set")?
                .into(),

            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .unwrap_or_else(|_| "72".to_string())
                .parse()
                .context("SESSION_TTL_HOURS must be an integer")?,

            cookie_secure: env::var("COOKIE_SECURE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("COOKIE_SECURE must be true or false")?,

            challenge_ttl_secs: env::var("CHALLENGE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("CHALLENGE_TTL_SECS must be an integer")?,

            cors_origin: env::var("CORS_ORIGIN").ok().filter(|s| !s.is_empty()),

            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            google: match (env::var("GOOGLE_CLIENT_ID"), env::var("GOOGLE_CLIENT_SECRET")) {
                (Ok(client_id), Ok(client_secret)) => Some(GoogleConfig {
                    client_id,
                    client_secret: client_secret.into(),
                    redirect_url: env::var("GOOGLE_REDIRECT_URL").unwrap_or_else(|_| {
                        "http://localhost:8080/users/auth/google/callback".to_string()
                    }),
                }),
                _ => None,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject lifetimes that would expire everything at once or overflow
    /// timestamp arithmetic
    pub fn validate(&self) -> Result<()> {
        if !SESSION_TTL_HOURS.contains(&self.session_ttl_hours) {
            bail!(
                "SESSION_TTL_HOURS must be between {} and {}, got {}",
                SESSION_TTL_HOURS.start(),
                SESSION_TTL_HOURS.end(),
                self.session_ttl_hours
            );
        }
        if !CHALLENGE_TTL_SECS.contains(&self.challenge_ttl_secs) {
            bail!(
                "CHALLENGE_TTL_SECS must be between {} and {}, got {}",
                CHALLENGE_TTL_SECS.start(),
                CHALLENGE_TTL_SECS.end(),
                self.challenge_ttl_secs
            );
        }

        Ok(())
    }

    /// Socket address for `tokio::net::TcpListener::bind()`, e.g. "127.0.0.1:8080"
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
