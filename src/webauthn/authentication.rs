//! # Passkey Authentication Logic
//!
//! Logs a user in with one of their enrolled passkeys.
//!
//! The login challenge is deleted before the assertion is checked, so it
//! can be redeemed at most once whether or not verification succeeds.

use crate::db::models::{ChallengePurpose, PasskeyCredential, User};
use crate::db::{challenges, credentials, users};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::webauthn::{decode_passkey, encode_passkey, BASE64_URL};
use base64::Engine;
use webauthn_rs::prelude::*;

/// Start passkey login for `username`
///
/// Returns the options for `navigator.credentials.get()`, with every
/// enrolled passkey listed in `allowCredentials`.
///
/// ## Errors
/// - `UserNotFound`: no such username
/// - `CredentialNotFound`: the user has no passkeys to log in with
pub async fn start_authentication(
    state: &AppState,
    username: &str,
) -> AppResult<RequestChallengeResponse> {
    let user = users::find_by_username(&state.db, username).await?;

    let passkeys = credentials::find_by_user_id(&state.db, &user.id)
        .await?
        .iter()
        .map(decode_passkey)
        .collect::<AppResult<Vec<Passkey>>>()?;
    if passkeys.is_empty() {
        return Err(AppError::CredentialNotFound);
    }

    let (rcr, auth_state) = state.webauthn.start_passkey_authentication(&passkeys)?;

    let challenge = challenges::issue(
        &state.db,
        &user.id,
        &BASE64_URL.encode(&rcr.public_key.challenge),
        &serde_json::to_string(&auth_state)?,
        ChallengePurpose::Login,
        state.challenge_ttl,
    )
    .await?;

    tracing::debug!(
        user_id = %user.id,
        challenge_id = %challenge.id,
        passkeys = passkeys.len(),
        "login challenge issued"
    );

    Ok(rcr)
}

/// Finish passkey login
///
/// ## Flow
/// 1. Resolve the user and redeem their live login challenge
/// 2. Let `webauthn-rs` check the assertion against the passkeys the
///    challenge was issued for
/// 3. Enforce the sign counter, then store it with the refreshed passkey
///    and the login time
///
/// ## Errors
/// - `UserNotFound`, `ChallengeNotFound`, `CredentialNotFound`
/// - `VerificationFailed`: no enrolled passkey accepts the assertion
pub async fn finish_authentication(
    state: &AppState,
    username: &str,
    credential: &PublicKeyCredential,
) -> AppResult<User> {
    let user = users::find_by_username(&state.db, username).await?;
    let challenge = challenges::find_active(&state.db, &user.id, ChallengePurpose::Login).await?;
    challenges::consume(&state.db, &challenge.id).await?;
    let auth_state: PasskeyAuthentication = serde_json::from_str(&challenge.state)?;

    let enrolled = credentials::find_by_user_id(&state.db, &user.id).await?;
    if enrolled.is_empty() {
        return Err(AppError::CredentialNotFound);
    }

    let result = state
        .webauthn
        .finish_passkey_authentication(credential, &auth_state)
        .map_err(|e| {
            tracing::debug!(user_id = %user.id, error = %e, "passkey did not verify");
            AppError::VerificationFailed(e.to_string())
        })?;

    let credential_id = BASE64_URL.encode(result.cred_id());
    let stored = enrolled
        .iter()
        .find(|stored| stored.credential_id == credential_id)
        .ok_or_else(|| {
            AppError::VerificationFailed(format!("credential {credential_id} is no longer enrolled"))
        })?;

    if !counter_advanced(stored.sign_count, result.counter()) {
        // possible cloned authenticator
        tracing::warn!(
            user_id = %user.id,
            %credential_id,
            stored = stored.sign_count,
            received = result.counter(),
            "passkey rejected: sign counter did not advance"
        );
        return Err(AppError::VerificationFailed(format!(
            "sign counter of credential {credential_id} went from {} to {}",
            stored.sign_count,
            result.counter()
        )));
    }

    let mut passkey = decode_passkey(stored)?;
    passkey.update_credential(&result);
    let used = PasskeyCredential {
        public_key: encode_passkey(&passkey)?,
        sign_count: i64::from(result.counter()),
        backup_eligible: result.backup_eligible(),
        backup_state: result.backup_state(),
        ..stored.clone()
    };

    credentials::record_use(&state.db, &used, stored.sign_count).await?;
    users::record_login(&state.db, &user.id).await?;

    tracing::info!(
        user_id = %user.id,
        %credential_id,
        sign_count = result.counter(),
        user_verified = result.user_verified(),
        backup_state = result.backup_state(),
        "passkey login"
    );

    Ok(user)
}

/// Once either side is non-zero the counter has to strictly increase
fn counter_advanced(stored: i64, received: u32) -> bool {
    let received = i64::from(received);
    (stored == 0 && received == 0) || received > stored
}
