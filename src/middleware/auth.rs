use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

/// The signed-in user, placed in request extensions by [`require_auth`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

/// Resolve the session cookie to a user that still exists
pub async fn authenticate(state: &AppState, jar: &CookieJar) -> AppResult<CurrentUser> {
    let user_id = state.sessions.current_user_id(jar)?;

    let user = users::find_by_id(&state.db, &user_id)
        .await
        .map_err(|e| match e {
            AppError::UserNotFound => AppError::Unauthorized("Not authenticated".to_string()),
            other => other,
        })?;

    Ok(CurrentUser {
        id: user.id,
        username: user.username,
    })
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let current_user = authenticate(&state, &jar).await?;
    request.extensions_mut().insert(current_user);

    Ok(next.run(request).await)
}
