//! # Session Tokens
//!
//! A session is an HS256 JWT carried in the `token` cookie. There is no
//! server-side session table: the token alone says who the user is until
//! it expires. Every login path (password or passkey) goes through
//! [`SessionIssuer::start_session`], so they all share one lifetime.

use crate::error::{AppError, AppResult};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Name of the cookie holding the session token
pub const SESSION_COOKIE: &str = "token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and checks session tokens
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    cookie_secure: bool,
}

impl SessionIssuer {
    pub fn new(secret: &SecretString, ttl: Duration, cookie_secure: bool) -> Self {
        let secret = secret.expose_secret().as_bytes();

        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
            cookie_secure,
        }
    }

    pub fn sign(&self, user_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
    }

    /// Check signature and expiry
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected session token");
                AppError::Unauthorized("Invalid or expired session".to_string())
            })
    }

    /// `HttpOnly`, `SameSite=Strict` cookie living exactly as long as the token
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.cookie_secure)
            .path("/")
            .max_age(time::Duration::seconds(self.ttl.num_seconds()))
            .build()
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.cookie_secure)
            .path("/")
            .build()
    }

    /// Mint a token for `user_id` and attach it to the response cookies
    pub fn start_session(&self, jar: CookieJar, user_id: &str) -> AppResult<CookieJar> {
        let token = self.sign(user_id)?;
        Ok(jar.add(self.session_cookie(token)))
    }

    /// User id of the session carried by `jar`, if any
    pub fn current_user_id(&self, jar: &CookieJar) -> AppResult<String> {
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

        Ok(self.verify(&token)?.sub)
    }
}
