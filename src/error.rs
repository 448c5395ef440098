//! # Error Handling
//!
//! Application-wide error type and its conversion into HTTP responses.
//!
//! Every handler returns `AppResult<T>`; errors are translated once, here,
//! into a JSON body of the form `{ "error": "..." }`.
//!
//! ## Status convention
//! | Variant | Status |
//! |---|---|
//! | `UserNotFound`, `ChallengeNotFound`, `CredentialNotFound` | 404 |
//! | `VerificationFailed`, `Unauthorized` | 401 |
//! | `BadRequest`, `WebAuthn` | 400 |
//! | `Conflict` | 409 |
//! | `Database`, `Serialization`, `Internal` | 500 |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors (SQLx library errors)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// `webauthn-rs` refused to build a ceremony
    ///
    /// Failed verifications are reported as `VerificationFailed` instead.
    #[error("WebAuthn error: {0}")]
    WebAuthn(#[from] webauthn_rs::prelude::WebauthnError),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No account matches the supplied username or id
    #[error("User not found")]
    UserNotFound,

    /// No live challenge of the expected purpose: never issued, expired,
    /// replaced by a newer one, or already consumed
    #[error("Challenge not found")]
    ChallengeNotFound,

    /// The user has no enrolled passkeys
    #[error("No passkeys registered for this user")]
    CredentialNotFound,

    /// A WebAuthn response failed its cryptographic or protocol checks.
    ///
    /// The inner message is logged, never returned to the client.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Client sent invalid data (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing, invalid or expired session, or bad password (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Uniqueness violation, e.g. username taken or credential already enrolled (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unexpected failure that shouldn't normally occur (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                // don't leak database internals
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::WebAuthn(e) => {
                tracing::error!("WebAuthn error: {:?}", e);
                (StatusCode::BAD_REQUEST, "Authentication error".to_string())
            }
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Serialization error".to_string())
            }
            AppError::VerificationFailed(reason) => {
                tracing::warn!(%reason, "WebAuthn verification failed");
                (StatusCode::UNAUTHORIZED, "Could not verify".to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::UserNotFound
            | AppError::ChallengeNotFound
            | AppError::CredentialNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;
