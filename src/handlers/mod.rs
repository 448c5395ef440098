//! # HTTP Request Handlers
//!
//! ## Submodules
//! - `health`: liveness endpoint
//! - `auth`: password accounts and session endpoints
//! - `google`: Google sign-in redirects
//! - `passkey`: WebAuthn registration and login
//! - `users`: the signed-in user's profile
//!
//! ## Handler Pattern
//! Handlers extract what they need (state, cookies, JSON body, the
//! `CurrentUser` set by middleware), call into the domain modules and
//! return `AppResult<...>`; errors become JSON responses in `error.rs`.

pub mod auth;
pub mod google;
pub mod health;
pub mod passkey;
pub mod users;
