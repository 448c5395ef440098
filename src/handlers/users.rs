//! # User Handlers

use crate::db::users;
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;
use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

/// Profile of the signed-in user
///
/// ## Route
/// GET /users/me (protected by `require_auth`)
///
/// The password hash is never serialized.
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<Value>> {
    let user = users::find_by_id(&state.db, &current_user.id).await?;

    Ok(Json(json!({ "user": user })))
}
