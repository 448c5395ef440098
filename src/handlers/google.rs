//! # Google Sign-In Handlers
//!
//! Both endpoints answer with redirects: the browser navigates here, not
//! the frontend's fetch calls.

use crate::error::AppError;
use crate::google::{self, CallbackQuery, GoogleOAuth};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// GET /users/auth/google
pub async fn start(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let oauth = client(&state)?;
    let (jar, url) = oauth.begin(jar);

    Ok((jar, Redirect::to(url.as_str())))
}

/// GET /users/auth/google/callback
///
/// Sets the session cookie and sends the browser to `/dashboard` on the
/// frontend, or to `/google-login-error` when anything goes wrong.
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<(CookieJar, Redirect), AppError> {
    let oauth = client(&state)?;

    let signed_in = async {
        let profile = oauth.complete(&jar, &query).await?;
        let user = google::sign_in(&state, &profile).await?;
        state.sessions.start_session(oauth.finish(jar.clone()), &user.id)
    }
    .await;

    match signed_in {
        Ok(jar) => Ok((jar, Redirect::to(&oauth.landing_page(true)))),
        Err(e) => {
            tracing::warn!(error = %e, "google sign-in failed");
            Ok((oauth.finish(jar), Redirect::to(&oauth.landing_page(false))))
        }
    }
}

fn client(state: &AppState) -> Result<Arc<GoogleOAuth>, AppError> {
    state
        .google
        .clone()
        .ok_or_else(|| AppError::BadRequest("Google sign-in is not configured".to_string()))
}
