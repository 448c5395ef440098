//! # Local Accounts
//!
//! Username + password sign-up and login. Passwords are stored as Argon2id
//! PHC strings; a signed-in user can then enroll passkeys.

use crate::db::models::{AuthMethod, User};
use crate::db::users;
use crate::error::{AppError, AppResult};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use serde::Deserialize;
use sqlx::SqlitePool;

const MIN_PASSWORD_LEN: usize = 6;

/// Body of `POST /users/create-user`
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

/// Body of `POST /users/login-user`
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn register(pool: &SqlitePool, req: RegisterRequest) -> AppResult<User> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".to_string()));
    }
    if let Some(email) = &req.email {
        if !email.contains('@') {
            return Err(AppError::BadRequest("Invalid email format".to_string()));
        }
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let user = User::new(
        username.to_string(),
        req.email,
        Some(hash_password(&req.password)?),
        AuthMethod::Local,
    );
    users::create_user(pool, &user).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "account created");

    Ok(user)
}

/// Check a username / password pair
///
/// Unknown users, passwordless accounts and wrong passwords all get the
/// same `Unauthorized` answer.
pub async fn login(pool: &SqlitePool, req: LoginRequest) -> AppResult<User> {
    let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

    let user = match users::find_by_username(pool, &req.username).await {
        Ok(user) => user,
        Err(AppError::UserNotFound) => return Err(invalid()),
        Err(e) => return Err(e),
    };

    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !verify_password(&req.password, hash)? {
        tracing::debug!(user_id = %user.id, "wrong password");
        return Err(invalid());
    }

    users::record_login(pool, &user.id).await?;
    Ok(user)
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
