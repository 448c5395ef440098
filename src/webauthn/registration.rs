//! # Passkey Registration Logic
//!
//! Enrolls a new passkey for a user who is already signed in (by password,
//! Google, or an earlier passkey). Registration is a two-step process.
//!
//! ## Registration Flow
//! 1. **Start**: store a fresh challenge and its ceremony state → send
//!    creation options to the client
//! 2. **Finish**: verify the attestation → store the passkey
//!
//! The challenge that produced a credential is kept, marked consumed and
//! linked to the credential id, so every enrolled passkey can be traced
//! back to the ceremony that created it.

use crate::db::models::{self, ChallengePurpose, PasskeyCredential};
use crate::db::{challenges, credentials, users};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::webauthn::{decode_passkey, encode_passkey, BASE64_URL};
use base64::Engine;
use webauthn_rs::prelude::*;

/// Start the passkey registration process
///
/// Issues a new registration challenge for `user_id`, replacing any that
/// is still outstanding, and returns the options for
/// `navigator.credentials.create()`. Passkeys the user already has are
/// listed in `excludeCredentials`.
///
/// ## Errors
/// - `UserNotFound`: the session names a user that no longer exists
/// - `Database`: the challenge could not be stored
pub async fn start_registration(
    state: &AppState,
    user_id: &str,
) -> AppResult<CreationChallengeResponse> {
    let user = users::find_by_id(&state.db, user_id).await?;

    // WebAuthn user handles are opaque bytes; ours are the account UUID
    let user_uuid = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Internal("Invalid user UUID".to_string()))?;

    let exclude = credentials::find_by_user_id(&state.db, &user.id)
        .await?
        .iter()
        .map(|stored| decode_passkey(stored).map(|passkey| passkey.cred_id().clone()))
        .collect::<AppResult<Vec<CredentialID>>>()?;
    let exclude = (!exclude.is_empty()).then_some(exclude);

    let (ccr, reg_state) = state.webauthn.start_passkey_registration(
        user_uuid,
        &user.username,
        &user.username,
        exclude,
    )?;

    let challenge = challenges::issue(
        &state.db,
        &user.id,
        &BASE64_URL.encode(&ccr.public_key.challenge),
        &serde_json::to_string(&reg_state)?,
        ChallengePurpose::Registration,
        state.challenge_ttl,
    )
    .await?;

    tracing::debug!(user_id = %user.id, challenge_id = %challenge.id, "registration challenge issued");

    Ok(ccr)
}

/// Finish the passkey registration process
///
/// ## Flow
/// 1. Load the user's live registration challenge and its ceremony state
/// 2. Let `webauthn-rs` verify the attestation against it
/// 3. In one transaction: insert the credential, then mark the challenge
///    consumed and link it to the new credential
///
/// A response that fails verification discards the challenge, so the
/// client has to start over.
///
/// ## Errors
/// - `ChallengeNotFound`: no live challenge, or it was redeemed concurrently
/// - `VerificationFailed`: the attestation did not check out
/// - `Conflict`: this authenticator is already enrolled
pub async fn finish_registration(
    state: &AppState,
    user_id: &str,
    credential: &RegisterPublicKeyCredential,
) -> AppResult<PasskeyCredential> {
    let challenge =
        challenges::find_active(&state.db, user_id, ChallengePurpose::Registration).await?;
    let reg_state: PasskeyRegistration = serde_json::from_str(&challenge.state)?;

    let passkey = match state
        .webauthn
        .finish_passkey_registration(credential, &reg_state)
    {
        Ok(passkey) => passkey,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "passkey registration rejected");
            challenges::discard(&state.db, &challenge.id).await?;
            return Err(AppError::VerificationFailed(e.to_string()));
        }
    };

    let transports = credential
        .response
        .transports
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    // backup flags are learned from the first assertion
    let stored = PasskeyCredential {
        credential_id: BASE64_URL.encode(passkey.cred_id()),
        user_id: user_id.to_string(),
        public_key: encode_passkey(&passkey)?,
        sign_count: 0,
        transports,
        backup_eligible: false,
        backup_state: false,
        created_at: models::now(),
        last_used_at: None,
    };

    let mut tx = state.db.begin().await?;
    credentials::insert(&mut *tx, &stored).await?;
    challenges::attach_credential(&mut *tx, &challenge.id, &stored.credential_id).await?;
    tx.commit().await?;

    tracing::info!(
        user_id,
        credential_id = %stored.credential_id,
        algorithm = ?passkey.cred_algorithm(),
        "passkey registered"
    );

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Device};
    use ciborium::value::Value;

    async fn linked_credential(state: &AppState, ccr: &CreationChallengeResponse) -> Option<String> {
        sqlx::query_scalar::<_, Option<String>>(
            "SELECT credential_id FROM challenges WHERE challenge = ? AND consumed_at IS NOT NULL",
        )
        .bind(BASE64_URL.encode(&ccr.public_key.challenge))
        .fetch_one(&state.db)
        .await
        .unwrap()
    }

    fn attestation_format(response: &RegisterPublicKeyCredential) -> String {
        let json = serde_json::to_value(response).unwrap();
        let encoded = json["response"]["attestationObject"].as_str().unwrap();
        let bytes = BASE64_URL.decode(encoded).unwrap();
        let object: Value = ciborium::de::from_reader(bytes.as_slice()).unwrap();

        object
            .as_map()
            .unwrap()
            .iter()
            .find(|(key, _)| key.as_text() == Some("fmt"))
            .and_then(|(_, fmt)| fmt.as_text())
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn registers_exactly_one_credential_and_links_challenge() {
        let state = testing::test_state().await;
        let user = testing::create_user(&state.db, "alice").await;
        let mut device = Device::default();

        let ccr = start_registration(&state, &user.id).await.unwrap();
        assert!(ccr
            .public_key
            .exclude_credentials
            .as_ref()
            .map_or(true, Vec::is_empty));

        let response = device.register(ccr.clone());
        let passkey = finish_registration(&state, &user.id, &response).await.unwrap();

        let stored = credentials::find_by_user_id(&state.db, &user.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].credential_id, response.id);
        assert_eq!(stored[0].sign_count, 0);

        // the stored text decodes back to the same passkey
        let decoded = decode_passkey(&stored[0]).unwrap();
        assert_eq!(BASE64_URL.encode(decoded.cred_id()), passkey.credential_id);
        assert_eq!(stored[0].public_key, passkey.public_key);

        assert_eq!(linked_credential(&state, &ccr).await, Some(response.id.clone()));
        assert!(matches!(
            challenges::find_active(&state.db, &user.id, ChallengePurpose::Registration).await,
            Err(AppError::ChallengeNotFound)
        ));
    }

    #[tokio::test]
    async fn packed_attestation_is_accepted() {
        let state = testing::test_state().await;
        let user = testing::create_user(&state.db, "alice").await;
        let mut device = Device::default();

        let ccr = start_registration(&state, &user.id).await.unwrap();
        let response = device.register(ccr);
        assert_eq!(attestation_format(&response), "packed");

        finish_registration(&state, &user.id, &response).await.unwrap();
    }

    #[tokio::test]
    async fn only_latest_challenge_is_accepted() {
        let state = testing::test_state().await;
        let user = testing::create_user(&state.db, "alice").await;
        let mut device = Device::default();

        let stale = start_registration(&state, &user.id).await.unwrap();
        let fresh = start_registration(&state, &user.id).await.unwrap();
        let stale_response = device.register(stale);
        let fresh_response = device.register(fresh);

        let result = finish_registration(&state, &user.id, &stale_response).await;
        assert!(matches!(result, Err(AppError::VerificationFailed(_))));

        // the failed attempt discarded the fresh challenge too
        let result = finish_registration(&state, &user.id, &fresh_response).await;
        assert!(matches!(result, Err(AppError::ChallengeNotFound)));

        let again = start_registration(&state, &user.id).await.unwrap();
        finish_registration(&state, &user.id, &device.register(again))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn finishing_twice_does_not_create_a_second_credential() {
        let state = testing::test_state().await;
        let user = testing::create_user(&state.db, "alice").await;
        let mut device = Device::default();

        let ccr = start_registration(&state, &user.id).await.unwrap();
        let response = device.register(ccr);
        finish_registration(&state, &user.id, &response).await.unwrap();

        assert!(matches!(
            finish_registration(&state, &user.id, &response).await,
            Err(AppError::ChallengeNotFound)
        ));
        assert_eq!(credentials::find_by_user_id(&state.db, &user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn enrolled_passkeys_are_excluded() {
        let state = testing::test_state().await;
        let user = testing::create_user(&state.db, "alice").await;
        let mut device = Device::default();

        let first = start_registration(&state, &user.id).await.unwrap();
        finish_registration(&state, &user.id, &device.register(first))
            .await
            .unwrap();

        let second = start_registration(&state, &user.id).await.unwrap();
        assert_eq!(second.public_key.exclude_credentials.map(|c| c.len()), Some(1));
    }

    #[tokio::test]
    async fn credential_enrolled_concurrently_conflicts() {
        let state = testing::test_state().await;
        let alice = testing::create_user(&state.db, "alice").await;
        let bob = testing::create_user(&state.db, "bob").await;
        let mut device = Device::default();

        let ccr = start_registration(&state, &alice.id).await.unwrap();
        let response = device.register(ccr);

        // the same credential id lands first through another request
        let mut conn = state.db.acquire().await.unwrap();
        let taken = PasskeyCredential {
            credential_id: response.id.clone(),
            user_id: bob.id.clone(),
            public_key: String::new(),
            sign_count: 0,
            transports: None,
            backup_eligible: false,
            backup_state: false,
            created_at: models::now(),
            last_used_at: None,
        };
        credentials::insert(&mut conn, &taken).await.unwrap();
        drop(conn);

        assert!(matches!(
            finish_registration(&state, &alice.id, &response).await,
            Err(AppError::Conflict(_))
        ));
        // the transaction rolled back, so the challenge is still live
        challenges::find_active(&state.db, &alice.id, ChallengePurpose::Registration)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wrong_origin_is_rejected() {
        let state = testing::test_state().await;
        let user = testing::create_user(&state.db, "alice").await;
        let mut device = Device::at_origin("http://localhost:4000");

        let ccr = start_registration(&state, &user.id).await.unwrap();
        assert!(matches!(
            finish_registration(&state, &user.id, &device.register(ccr)).await,
            Err(AppError::VerificationFailed(_))
        ));
        assert!(credentials::find_by_user_id(&state.db, &user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_user_cannot_start() {
        let state = testing::test_state().await;
        assert!(matches!(
            start_registration(&state, "no-such-user").await,
            Err(AppError::UserNotFound)
        ));
    }
}
