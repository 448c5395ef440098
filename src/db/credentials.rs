//! # Credential Registry
//!
//! CRUD operations for passkey credentials. Only public keys are stored;
//! private keys never leave the user's device.

use crate::db::models::{self, PasskeyCredential};
use crate::error::{AppError, AppResult};
use sqlx::{SqliteConnection, SqlitePool};

/// Insert a newly registered credential
///
/// Takes a connection so that registration can insert the credential and
/// link its challenge in one transaction. The credential id is the primary
/// key; enrolling the same authenticator twice yields `Conflict`.
pub async fn insert(conn: &mut SqliteConnection, credential: &PasskeyCredential) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO passkey_credentials
         (credential_id, user_id, public_key, sign_count, transports, backup_eligible, backup_state, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&credential.credential_id)
    .bind(&credential.user_id)
    .bind(&credential.public_key)
    .bind(credential.sign_count)
    .bind(&credential.transports)
    .bind(credential.backup_eligible)
    .bind(credential.backup_state)
    .bind(&credential.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict("Passkey is already registered".to_string())
        }
        _ => AppError::Database(e),
    })?;

    Ok(())
}

/// All credentials of a user, oldest enrollment first
///
/// Returns an empty vector when the user has none.
pub async fn find_by_user_id(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<PasskeyCredential>> {
    let credentials = sqlx::query_as::<_, PasskeyCredential>(
        "SELECT * FROM passkey_credentials
         WHERE user_id = ?
         ORDER BY created_at ASC, rowid ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(credentials)
}

/// Store the state of a credential after a successful assertion
///
/// Writes the counter, backup flags and serialized passkey from `used`.
/// Compare-and-swap on the counter the assertion was checked against: if
/// another login already moved it, this one is rejected instead of
/// silently rolling the counter back.
pub async fn record_use(
    pool: &SqlitePool,
    used: &PasskeyCredential,
    previous_count: i64,
) -> AppResult<()> {
    let updated = sqlx::query(
        "UPDATE passkey_credentials
         SET sign_count = ?, public_key = ?, backup_eligible = ?, backup_state = ?, last_used_at = ?
         WHERE credential_id = ? AND sign_count = ?",
    )
    .bind(used.sign_count)
    .bind(&used.public_key)
    .bind(used.backup_eligible)
    .bind(used.backup_state)
    .bind(models::now())
    .bind(&used.credential_id)
    .bind(previous_count)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::VerificationFailed(format!(
            "sign counter of credential {} changed concurrently",
            used.credential_id
        )));
    }

    Ok(())
}
