//! # Challenge Store
//!
//! One-time WebAuthn challenges, keyed by user and purpose.
//!
//! At most one unconsumed challenge exists per (user, purpose): issuing a
//! new one drops the previous one, so a re-issued challenge always wins and
//! the older value can never be redeemed. Every state transition that
//! redeems a challenge is a conditional write checked through
//! `rows_affected`, so two concurrent requests cannot both use it.

use crate::db::models::{self, Challenge, ChallengePurpose};
use crate::error::{AppError, AppResult};
use chrono::Duration;
use sqlx::{SqliteConnection, SqlitePool};

/// Persist a fresh challenge, replacing any unconsumed one of the same purpose
///
/// `state` is the serialized ceremony state the verify step resumes from.
pub async fn issue(
    pool: &SqlitePool,
    user_id: &str,
    value: &str,
    state: &str,
    purpose: ChallengePurpose,
    ttl: Duration,
) -> AppResult<Challenge> {
    let challenge = Challenge::new(
        user_id.to_string(),
        value.to_string(),
        state.to_string(),
        purpose,
        ttl,
    );

    let mut tx = pool.begin().await?;

    let replaced = sqlx::query(
        "DELETE FROM challenges
         WHERE user_id = ? AND login_purpose = ? AND consumed_at IS NULL",
    )
    .bind(user_id)
    .bind(purpose.is_login())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query(
        "INSERT INTO challenges (id, user_id, challenge, state, login_purpose, created_at, expires_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&challenge.id)
    .bind(&challenge.user_id)
    .bind(&challenge.challenge)
    .bind(&challenge.state)
    .bind(challenge.login_purpose)
    .bind(&challenge.created_at)
    .bind(&challenge.expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if replaced > 0 {
        tracing::debug!(user_id, ?purpose, replaced, "replaced outstanding challenge");
    }

    Ok(challenge)
}

/// The live challenge of `purpose` for `user_id`
///
/// Missing, consumed and expired challenges all yield `ChallengeNotFound`.
pub async fn find_active(
    pool: &SqlitePool,
    user_id: &str,
    purpose: ChallengePurpose,
) -> AppResult<Challenge> {
    let challenge = sqlx::query_as::<_, Challenge>(
        "SELECT * FROM challenges
         WHERE user_id = ? AND login_purpose = ? AND consumed_at IS NULL
         ORDER BY created_at DESC
         LIMIT 1",
    )
    .bind(user_id)
    .bind(purpose.is_login())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::ChallengeNotFound)?;

    if challenge.is_expired() {
        tracing::debug!(user_id, ?purpose, challenge_id = %challenge.id, "challenge expired");
        return Err(AppError::ChallengeNotFound);
    }

    Ok(challenge)
}

/// Redeem a login challenge by deleting it
///
/// Only one caller can win; the others get `ChallengeNotFound`.
pub async fn consume(pool: &SqlitePool, challenge_id: &str) -> AppResult<()> {
    let deleted = sqlx::query("DELETE FROM challenges WHERE id = ? AND consumed_at IS NULL")
        .bind(challenge_id)
        .execute(pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::ChallengeNotFound);
    }

    Ok(())
}

/// Mark a registration challenge consumed and link the credential it produced
///
/// Runs on the caller's transaction together with the credential insert.
pub async fn attach_credential(
    conn: &mut SqliteConnection,
    challenge_id: &str,
    credential_id: &str,
) -> AppResult<()> {
    let updated = sqlx::query(
        "UPDATE challenges SET consumed_at = ?, credential_id = ?
         WHERE id = ? AND consumed_at IS NULL",
    )
    .bind(models::now())
    .bind(credential_id)
    .bind(challenge_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::ChallengeNotFound);
    }

    Ok(())
}

/// Drop an unconsumed challenge after a failed ceremony
pub async fn discard(pool: &SqlitePool, challenge_id: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM challenges WHERE id = ? AND consumed_at IS NULL")
        .bind(challenge_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Delete expired, never-redeemed challenges. Run periodically.
pub async fn cleanup_expired(pool: &SqlitePool) -> AppResult<u64> {
    let deleted = sqlx::query("DELETE FROM challenges WHERE expires_at < ? AND consumed_at IS NULL")
        .bind(models::now())
        .execute(pool)
        .await?
        .rows_affected();

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn ttl() -> Duration {
        Duration::minutes(5)
    }

    #[tokio::test]
    async fn reissue_replaces_previous_challenge() {
        let pool = testing::test_pool().await;
        let user = testing::create_user(&pool, "alice").await;

        let first = issue(&pool, &user.id, "first", "{}", ChallengePurpose::Registration, ttl())
            .await
            .unwrap();
        let second = issue(&pool, &user.id, "second", "{}", ChallengePurpose::Registration, ttl())
            .await
            .unwrap();

        let active = find_active(&pool, &user.id, ChallengePurpose::Registration)
            .await
            .unwrap();
        assert_eq!(active.id, second.id);
        assert_eq!(active.challenge, "second");

        // the first one is gone for good
        assert!(matches!(consume(&pool, &first.id).await, Err(AppError::ChallengeNotFound)));
    }

    #[tokio::test]
    async fn purposes_are_independent() {
        let pool = testing::test_pool().await;
        let user = testing::create_user(&pool, "alice").await;

        issue(&pool, &user.id, "reg", "{}", ChallengePurpose::Registration, ttl())
            .await
            .unwrap();
        issue(&pool, &user.id, "login", "{}", ChallengePurpose::Login, ttl())
            .await
            .unwrap();

        let reg = find_active(&pool, &user.id, ChallengePurpose::Registration).await.unwrap();
        let login = find_active(&pool, &user.id, ChallengePurpose::Login).await.unwrap();
        assert_eq!(reg.challenge, "reg");
        assert!(!reg.login_purpose);
        assert_eq!(login.challenge, "login");
        assert!(login.login_purpose);
    }

    #[tokio::test]
    async fn consume_succeeds_once() {
        let pool = testing::test_pool().await;
        let user = testing::create_user(&pool, "alice").await;
        let challenge = issue(&pool, &user.id, "c", "{}", ChallengePurpose::Login, ttl())
            .await
            .unwrap();

        consume(&pool, &challenge.id).await.unwrap();
        assert!(matches!(consume(&pool, &challenge.id).await, Err(AppError::ChallengeNotFound)));
        assert!(matches!(
            find_active(&pool, &user.id, ChallengePurpose::Login).await,
            Err(AppError::ChallengeNotFound)
        ));
    }

    #[tokio::test]
    async fn expired_challenges_are_not_found_and_cleaned_up() {
        let pool = testing::test_pool().await;
        let user = testing::create_user(&pool, "alice").await;
        issue(&pool, &user.id, "old", "{}", ChallengePurpose::Login, Duration::seconds(-5))
            .await
            .unwrap();

        assert!(matches!(
            find_active(&pool, &user.id, ChallengePurpose::Login).await,
            Err(AppError::ChallengeNotFound)
        ));
        assert_eq!(cleanup_expired(&pool).await.unwrap(), 1);
        assert_eq!(cleanup_expired(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn discard_only_touches_unconsumed() {
        let pool = testing::test_pool().await;
        let user = testing::create_user(&pool, "alice").await;
        let challenge = issue(&pool, &user.id, "c", "{}", ChallengePurpose::Registration, ttl())
            .await
            .unwrap();

        discard(&pool, &challenge.id).await.unwrap();
        assert!(matches!(
            find_active(&pool, &user.id, ChallengePurpose::Registration).await,
            Err(AppError::ChallengeNotFound)
        ));
    }
}
