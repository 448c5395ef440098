//! # Middleware Module
//!
//! Middleware functions run before the route handlers and can
//! short-circuit the request.
//!
//! ## Our Middleware
//! - `auth`: requires a valid session cookie and exposes the signed-in
//!   user to the handler as an `Extension<CurrentUser>`

pub mod auth;
