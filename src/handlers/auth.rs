//! # Account Handlers
//!
//! Password sign-up and login, logout, and the session check the frontend
//! calls on page load.

use crate::accounts::{self, LoginRequest, RegisterRequest};
use crate::error::{AppError, AppResult};
use crate::middleware::auth;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};

/// POST /users/create-user
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user = accounts::register(&state.db, req).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "User registered successfully",
            "user": user
        })),
    ))
}

/// POST /users/login-user
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<Value>)> {
    let user = accounts::login(&state.db, req).await?;
    let jar = state.sessions.start_session(jar, &user.id)?;

    Ok((
        jar,
        Json(json!({
            "status": "success",
            "message": "Login Success",
            "id": user.id,
            "username": user.username,
            "email": user.email
        })),
    ))
}

/// POST /users/logout
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    (
        jar.remove(state.sessions.removal_cookie()),
        Json(json!({ "message": "Logged out successfully" })),
    )
}

/// GET /users/checkAuthenticated
///
/// ## Response
/// ```json
/// { "isAuthenticated": true, "id": "...", "username": "alice" }
/// ```
/// or 401 with `{ "isAuthenticated": false }` when there is no valid session.
pub async fn check_authenticated(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(StatusCode, Json<Value>)> {
    match auth::authenticate(&state, &jar).await {
        Ok(user) => Ok((
            StatusCode::OK,
            Json(json!({
                "isAuthenticated": true,
                "id": user.id,
                "username": user.username
            })),
        )),
        Err(AppError::Unauthorized(_)) => Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "isAuthenticated": false })),
        )),
        Err(e) => Err(e),
    }
}
