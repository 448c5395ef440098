//! Shared fixtures for unit tests: an in-memory database, a ready-made
//! `AppState`, and a software passkey that answers WebAuthn ceremonies
//! the way a browser would.

use crate::config::{Config, GoogleConfig};
use crate::db::models::{AuthMethod, User};
use crate::db::users;
use crate::state::AppState;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use webauthn_authenticator_rs::softpasskey::SoftPasskey;
use webauthn_authenticator_rs::WebauthnAuthenticator;
use webauthn_rs::prelude::{
    CreationChallengeResponse, PublicKeyCredential, RegisterPublicKeyCredential,
    RequestChallengeResponse, Url,
};

pub const TEST_ORIGIN: &str = "http://localhost:5173";

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        rp_id: "localhost".to_string(),
        rp_origin: TEST_ORIGIN.to_string(),
        rp_name: "Test Machine".to_string(),
        jwt_secret: "test-secret-do-not-use".to_string().into(),
        session_ttl_hours: 72,
        cookie_secure: false,
        challenge_ttl_secs: 300,
        cors_origin: None,
        frontend_url: "http://localhost:5173".to_string(),
        google: None,
    }
}

/// `test_config` with a Google client registered
pub fn google_config() -> Config {
    Config {
        google: Some(GoogleConfig {
            client_id: "client-123".to_string(),
            client_secret: "shh".to_string().into(),
            redirect_url: "http://localhost:8080/users/auth/google/callback".to_string(),
        }),
        ..test_config()
    }
}

/// Fresh, migrated in-memory database
///
/// An in-memory SQLite database lives and dies with its connection, so the
/// pool is pinned to a single one.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

pub async fn test_state() -> AppState {
    AppState::from_pool(test_pool().await, &test_config()).unwrap()
}

pub async fn create_user(pool: &SqlitePool, username: &str) -> User {
    let user = User::new(username.to_string(), None, None, AuthMethod::Local);
    users::create_user(pool, &user).await.unwrap();
    user
}

/// Software passkey plus the origin its client claims to run on
///
/// Each registration creates a new key pair inside the device; sign-in
/// uses whichever of its keys the request allows.
pub struct Device {
    authenticator: WebauthnAuthenticator<SoftPasskey>,
    origin: Url,
}

impl Default for Device {
    fn default() -> Self {
        Self::at_origin(TEST_ORIGIN)
    }
}

impl Device {
    pub fn at_origin(origin: &str) -> Self {
        Self {
            // reports user verification, as platform passkeys do
            authenticator: WebauthnAuthenticator::new(SoftPasskey::new(true)),
            origin: Url::parse(origin).unwrap(),
        }
    }

    /// Answer `navigator.credentials.create()`
    pub fn register(&mut self, options: CreationChallengeResponse) -> RegisterPublicKeyCredential {
        self.authenticator
            .do_registration(self.origin.clone(), options)
            .unwrap()
    }

    /// Answer `navigator.credentials.get()`
    pub fn sign_in(&mut self, options: RequestChallengeResponse) -> PublicKeyCredential {
        self.authenticator
            .do_authentication(self.origin.clone(), options)
            .unwrap()
    }
}
