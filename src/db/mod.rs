//! # Database Module
//!
//! - `models`: row types (User, PasskeyCredential, Challenge)
//! - `users`: user directory lookups and account creation
//! - `credentials`: passkey credential registry
//! - `challenges`: one-time WebAuthn challenges (registration & login)

pub mod challenges;
pub mod credentials;
pub mod models;
pub mod users;
