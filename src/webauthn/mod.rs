//! # WebAuthn Module
//!
//! Passkey registration and login on top of `webauthn-rs`.
//!
//! ## Submodules
//! - `types`: request bodies for the API
//! - `registration`: enrolling a new passkey for a signed-in user
//! - `authentication`: logging in with an enrolled passkey
//!
//! ## WebAuthn Flow Overview
//!
//! ### Registration (Creating a Passkey)
//! 1. Signed-in client requests options → `registration::start_registration()`
//! 2. Server stores the challenge with the serialized `PasskeyRegistration`
//! 3. Client calls `navigator.credentials.create()`
//! 4. Client posts the attestation → `registration::finish_registration()`
//! 5. `webauthn-rs` verifies it and the resulting `Passkey` is stored
//!
//! ### Authentication (Logging In)
//! 1. Client sends a username → `authentication::start_authentication()`
//! 2. Server stores the challenge with a `PasskeyAuthentication` covering
//!    every enrolled passkey of the user
//! 3. Client calls `navigator.credentials.get()`
//! 4. Client posts the assertion → `authentication::finish_authentication()`
//! 5. `webauthn-rs` picks the matching passkey and checks the signature
//! 6. If it verifies, a session cookie is issued

pub mod authentication;
pub mod registration;
pub mod types;

use crate::db::models::PasskeyCredential;
use crate::error::{AppError, AppResult};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use webauthn_rs::prelude::Passkey;

/// base64url engine that emits no padding and accepts input with or without it
pub(crate) const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Text form of a passkey for the `public_key` column
pub(crate) fn encode_passkey(passkey: &Passkey) -> AppResult<String> {
    Ok(STANDARD.encode(serde_json::to_vec(passkey)?))
}

/// Inverse of [`encode_passkey`]
pub(crate) fn decode_passkey(stored: &PasskeyCredential) -> AppResult<Passkey> {
    let bytes = STANDARD.decode(&stored.public_key).map_err(|e| {
        AppError::Internal(format!(
            "stored key of credential {} is not base64: {e}",
            stored.credential_id
        ))
    })?;

    Ok(serde_json::from_slice(&bytes)?)
}
