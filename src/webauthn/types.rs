//! # WebAuthn API Types
//!
//! Request bodies for the passkey endpoints. The credentials themselves
//! are the `webauthn-rs` types, which read the browser's JSON encoding of
//! `PublicKeyCredential` (camelCase, binary fields as base64url), so the
//! output of `@simplewebauthn/browser` can be posted as-is.

use serde::Deserialize;
use webauthn_rs::prelude::{PublicKeyCredential, RegisterPublicKeyCredential};

/// Body of `POST /passkey/register/verify`
///
/// ## Example JSON
/// ```json
/// { "cred": { "id": "...", "rawId": "...", "type": "public-key",
///             "response": { "clientDataJSON": "...", "attestationObject": "..." } } }
/// ```
#[derive(Debug, Deserialize)]
pub struct RegistrationVerifyRequest {
    pub cred: RegisterPublicKeyCredential,
}

/// Body of `POST /passkey/login/options`
#[derive(Debug, Deserialize)]
pub struct LoginOptionsRequest {
    pub username: String,
}

/// Body of `POST /passkey/login/verify`
#[derive(Debug, Deserialize)]
pub struct LoginVerifyRequest {
    pub username: String,
    pub cred: PublicKeyCredential,
}
