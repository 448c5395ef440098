//! # Database Models
//!
//! Structs mapping to rows of the `users`, `passkey_credentials` and
//! `challenges` tables.
//!
//! Timestamps are stored as RFC3339 text in UTC with a fixed microsecond
//! precision, so lexical order equals chronological order.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Format a timestamp the way every table stores it
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in storage format
pub fn now() -> String {
    timestamp(Utc::now())
}

/// How an account was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Local,
    Google,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Local => "local",
            AuthMethod::Google => "google",
        }
    }
}

/// User account
///
/// A user owns any number of passkey credentials and challenges; both are
/// removed by `ON DELETE CASCADE` if the user row is ever deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// UUID v4
    pub id: String,

    /// Unique login name
    pub username: String,

    pub email: Option<String>,

    /// Argon2 PHC string; `None` for passkey-only or social accounts
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// Google account subject, set for accounts created by Google sign-in
    #[serde(skip_serializing)]
    pub google_id: Option<String>,

    /// `local` or `google`
    pub auth_method: String,

    pub created_at: String,
    pub updated_at: String,
    pub last_login_at: Option<String>,
}

impl User {
    pub fn new(
        username: String,
        email: Option<String>,
        password_hash: Option<String>,
        auth_method: AuthMethod,
    ) -> Self {
        let now = now();

        Self {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            google_id: None,
            auth_method: auth_method.as_str().to_string(),
            created_at: now.clone(),
            updated_at: now,
            last_login_at: None,
        }
    }

    /// Account for a first-time Google sign-in; it has no password
    pub fn from_google(username: String, email: Option<String>, google_id: String) -> Self {
        Self {
            google_id: Some(google_id),
            ..Self::new(username, email, None, AuthMethod::Google)
        }
    }
}

/// Registered passkey
///
/// Only the public half of the key pair is stored. `public_key` holds the
/// serialized `webauthn_rs` passkey (COSE key, credential id, counter) as
/// standard base64 text; login decodes exactly the bytes registration
/// encoded.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PasskeyCredential {
    /// base64url (no padding) of the authenticator's raw credential id
    pub credential_id: String,

    pub user_id: String,

    /// base64 of the serialized passkey
    pub public_key: String,

    /// Last signature counter seen from the authenticator
    pub sign_count: i64,

    /// JSON array such as `["internal","hybrid"]`
    pub transports: Option<String>,

    /// Credential may be synced to other devices. Refreshed on every login.
    pub backup_eligible: bool,

    /// Credential is currently backed up. Refreshed on every login.
    pub backup_state: bool,

    pub created_at: String,
    pub last_used_at: Option<String>,
}

/// Which ceremony a challenge belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengePurpose {
    Registration,
    Login,
}

impl ChallengePurpose {
    /// Value of the `login_purpose` column
    pub fn is_login(self) -> bool {
        matches!(self, ChallengePurpose::Login)
    }
}

/// One outstanding WebAuthn challenge
///
/// ## Lifecycle
/// 1. Issued → the previous unconsumed challenge of the same purpose is dropped
/// 2. Looked up by the verify step (must be unconsumed and unexpired)
/// 3. Login: deleted when used, whatever the outcome.
///    Registration: kept, with `consumed_at` and the `credential_id` it produced.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Challenge {
    pub id: String,
    pub user_id: String,

    /// base64url (no padding) of the random challenge bytes, exactly as sent
    /// to the client
    pub challenge: String,

    /// Serialized `PasskeyRegistration` or `PasskeyAuthentication`
    pub state: String,

    pub login_purpose: bool,
    pub created_at: String,
    pub expires_at: String,
    pub consumed_at: Option<String>,

    /// Credential produced by this registration challenge
    pub credential_id: Option<String>,
}

impl Challenge {
    pub fn new(
        user_id: String,
        challenge: String,
        state: String,
        purpose: ChallengePurpose,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        // four-digit years keep the text column ordered
        let expires_at = now + ttl.min(Duration::days(365));

        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            challenge,
            state,
            login_purpose: purpose.is_login(),
            created_at: timestamp(now),
            expires_at: timestamp(expires_at),
            consumed_at: None,
            credential_id: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_sort_chronologically() {
        let earlier = Utc::now();
        let later = earlier + Duration::milliseconds(1);
        assert!(timestamp(earlier) < timestamp(later));
        assert_eq!(timestamp(earlier).len(), timestamp(later).len());
    }

    #[test]
    fn challenge_expiry() {
        let live = Challenge::new(
            "u".into(),
            "c".into(),
            "{}".into(),
            ChallengePurpose::Login,
            Duration::minutes(5),
        );
        assert!(!live.is_expired());
        assert!(live.login_purpose);

        let stale = Challenge::new(
            "u".into(),
            "c".into(),
            "{}".into(),
            ChallengePurpose::Registration,
            Duration::seconds(-1),
        );
        assert!(stale.is_expired());
        assert!(!stale.login_purpose);
    }

    #[test]
    fn oversized_ttl_is_capped() {
        let challenge = Challenge::new(
            "u".into(),
            "c".into(),
            "{}".into(),
            ChallengePurpose::Login,
            Duration::MAX,
        );
        assert!(!challenge.is_expired());
        assert_eq!(challenge.expires_at.len(), challenge.created_at.len());
    }

    #[test]
    fn google_accounts_have_no_password() {
        let user = User::from_google("Alice".into(), None, "1234".into());
        assert_eq!(user.auth_method, "google");
        assert_eq!(user.google_id.as_deref(), Some("1234"));
        assert!(user.password_hash.is_none());
    }
}
