use crate::db::models::{self, User};
use crate::error::{AppError, AppResult};
use sqlx::SqlitePool;

pub async fn create_user(pool: &SqlitePool, user: &User) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, google_id, auth_method, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.google_id)
    .bind(&user.auth_method)
    .bind(&user.created_at)
    .bind(&user.updated_at)
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict(format!("User '{}' already exists", user.username))
        }
        _ => AppError::Database(e),
    })?;

    Ok(())
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::UserNotFound)
}

pub async fn find_by_id(pool: &SqlitePool, user_id: &str) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::UserNotFound)
}

/// Account linked to a Google subject, if one was created before
pub async fn find_by_google_id(pool: &SqlitePool, google_id: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE google_id = ?")
        .bind(google_id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

pub async fn record_login(pool: &SqlitePool, user_id: &str) -> AppResult<()> {
    let now = models::now();

    sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&now)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}
