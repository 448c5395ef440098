//! # Routes
//!
//! | Method | Path | Auth |
//! |---|---|---|
//! | GET | `/health` | |
//! | POST | `/users/create-user` | |
//! | POST | `/users/login-user` | |
//! | POST | `/users/logout` | |
//! | GET | `/users/checkAuthenticated` | cookie checked in handler |
//! | GET | `/users/auth/google` | only when Google is configured |
//! | GET | `/users/auth/google/callback` | only when Google is configured |
//! | GET | `/users/me` | `require_auth` |
//! | POST | `/passkey/register/options` | `require_auth` |
//! | POST | `/passkey/register/verify` | `require_auth` |
//! | POST | `/passkey/login/options` | |
//! | POST | `/passkey/login/verify` | |

use crate::handlers::{auth, google, health::health_check, passkey, users};
use crate::middleware::auth::require_auth;
use crate::state::AppState;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the application router. CORS is layered on by the caller.
pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/users/me", get(users::get_current_user))
        .route("/passkey/register/options", post(passkey::register_options))
        .route("/passkey/register/verify", post(passkey::register_verify))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/users/create-user", post(auth::register))
        .route("/users/login-user", post(auth::login))
        .route("/users/logout", post(auth::logout))
        .route("/users/checkAuthenticated", get(auth::check_authenticated))
        .route("/passkey/login/options", post(passkey::login_options))
        .route("/passkey/login/verify", post(passkey::login_verify))
        .merge(protected_routes);

    if state.google.is_some() {
        router = router
            .route("/users/auth/google", get(google::start))
            .route("/users/auth/google/callback", get(google::callback));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
