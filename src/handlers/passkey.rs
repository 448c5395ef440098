//! # Passkey Handlers
//!
//! The four WebAuthn endpoints. Registration needs a signed-in user;
//! login is itself the way to become one.

use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;
use crate::webauthn::types::{LoginOptionsRequest, LoginVerifyRequest, RegistrationVerifyRequest};
use crate::webauthn::{authentication, registration};
use axum::{extract::State, Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};

/// POST /passkey/register/options
///
/// Responds with `{ "options": PublicKeyCredentialCreationOptions }`.
pub async fn register_options(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<Value>> {
    let ccr = registration::start_registration(&state, &current_user.id).await?;

    Ok(Json(json!({ "options": ccr.public_key })))
}

/// POST /passkey/register/verify
///
/// ## Response
/// ```json
/// { "verified": true, "credentialId": "..." }
/// ```
pub async fn register_verify(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<RegistrationVerifyRequest>,
) -> AppResult<Json<Value>> {
    let passkey = registration::finish_registration(&state, &current_user.id, &req.cred).await?;

    Ok(Json(json!({
        "verified": true,
        "credentialId": passkey.credential_id
    })))
}

/// POST /passkey/login/options
pub async fn login_options(
    State(state): State<AppState>,
    Json(req): Json<LoginOptionsRequest>,
) -> AppResult<Json<Value>> {
    let rcr = authentication::start_authentication(&state, &req.username).await?;

    Ok(Json(json!({ "options": rcr.public_key })))
}

/// POST /passkey/login/verify
///
/// Sets the session cookie on success.
pub async fn login_verify(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginVerifyRequest>,
) -> AppResult<(CookieJar, Json<Value>)> {
    let user = authentication::finish_authentication(&state, &req.username, &req.cred).await?;
    let jar = state.sessions.start_session(jar, &user.id)?;

    Ok((jar, Json(json!({ "success": true }))))
}
