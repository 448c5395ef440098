//! # Google Sign-In
//!
//! OAuth 2.0 authorization-code flow with PKCE (S256) against Google.
//!
//! ## Flow
//! 1. `GET /users/auth/google`: a random `state` and PKCE verifier are put
//!    in short-lived cookies and the browser is sent to Google's consent
//!    screen
//! 2. `GET /users/auth/google/callback?code&state`: the state is checked
//!    against the cookie, the code is exchanged for an access token, and
//!    the profile is read from the userinfo endpoint
//! 3. The Google subject is looked up (or a `google` account created) and
//!    the same session cookie as every other login path is set

use crate::config::Config;
use crate::db::models::User;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

const SCOPES: &str = "openid email profile";

/// Cookie carrying the `state` parameter between the two redirects
pub const STATE_COOKIE: &str = "google_oauth_state";

/// Cookie carrying the PKCE code verifier between the two redirects
pub const VERIFIER_COOKIE: &str = "google_oauth_verifier";

/// How long the user has to get through Google's consent screen
const FLOW_MINUTES: i64 = 10;

/// Token endpoint reply; only the access token is used
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// The OpenID Connect userinfo claims we keep
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    /// Stable Google account id
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Query string Google appends to the callback URL
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Google OAuth client
pub struct GoogleOAuth {
    client_id: String,
    client_secret: SecretString,
    redirect_url: String,
    authorization_endpoint: Url,
    token_endpoint: Url,
    userinfo_endpoint: Url,
    cookie_secure: bool,
    frontend_url: String,
    http: reqwest::Client,
}

impl GoogleOAuth {
    /// `None` unless a Google client is configured
    pub fn from_config(config: &Config) -> anyhow::Result<Option<Self>> {
        let Some(google) = &config.google else {
            return Ok(None);
        };

        Ok(Some(Self {
            client_id: google.client_id.clone(),
            client_secret: google.client_secret.clone(),
            redirect_url: Url::parse(&google.redirect_url)?.to_string(),
            authorization_endpoint: Url::parse(AUTHORIZATION_ENDPOINT)?,
            token_endpoint: Url::parse(TOKEN_ENDPOINT)?,
            userinfo_endpoint: Url::parse(USERINFO_ENDPOINT)?,
            cookie_secure: config.cookie_secure,
            frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }))
    }

    /// Point the client at a stand-in provider
    #[cfg(test)]
    pub fn with_base_url(mut self, base: &Url) -> Self {
        self.authorization_endpoint = base.join("auth").unwrap();
        self.token_endpoint = base.join("token").unwrap();
        self.userinfo_endpoint = base.join("userinfo").unwrap();
        self
    }

    /// Frontend page the browser lands on after the callback
    pub fn landing_page(&self, signed_in: bool) -> String {
        if signed_in {
            format!("{}/dashboard", self.frontend_url)
        } else {
            format!("{}/google-login-error", self.frontend_url)
        }
    }

    /// Consent-screen URL for one sign-in attempt
    pub fn authorization_url(&self, state: &str, code_verifier: &str) -> Url {
        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("scope", SCOPES)
            .append_pair("state", state)
            .append_pair("code_challenge", &code_challenge(code_verifier))
            .append_pair("code_challenge_method", "S256");
        url
    }

    /// Start a sign-in attempt: remember `state` and the verifier in
    /// cookies and return where to send the browser
    pub fn begin(&self, jar: CookieJar) -> (CookieJar, Url) {
        let state = random_string(32);
        let verifier = random_string(64);
        let url = self.authorization_url(&state, &verifier);

        let jar = jar
            .add(self.flow_cookie(STATE_COOKIE, state))
            .add(self.flow_cookie(VERIFIER_COOKIE, verifier));
        (jar, url)
    }

    /// Drop the flow cookies once the callback has been handled
    pub fn finish(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build(STATE_COOKIE).path("/"))
            .remove(Cookie::build(VERIFIER_COOKIE).path("/"))
    }

    /// Check the callback against the cookies and fetch the profile
    ///
    /// ## Errors
    /// - `Unauthorized`: Google reported an error, or `state` does not match
    /// - `Internal`: Google could not be reached or answered unexpectedly
    pub async fn complete(
        &self,
        jar: &CookieJar,
        query: &CallbackQuery,
    ) -> AppResult<GoogleProfile> {
        if let Some(error) = &query.error {
            return Err(AppError::Unauthorized(format!("Google sign-in refused: {error}")));
        }

        let expected = jar.get(STATE_COOKIE).map(Cookie::value);
        let (Some(code), Some(state), Some(expected)) = (&query.code, &query.state, expected)
        else {
            return Err(AppError::Unauthorized("Incomplete Google callback".to_string()));
        };
        if state != expected {
            return Err(AppError::Unauthorized("OAuth state mismatch".to_string()));
        }

        let verifier = jar
            .get(VERIFIER_COOKIE)
            .map(Cookie::value)
            .ok_or_else(|| AppError::Unauthorized("Missing PKCE verifier".to_string()))?;

        let access_token = self.exchange_code(code, verifier).await?;
        self.fetch_profile(&access_token).await
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> AppResult<String> {
        let response = self
            .http
            .post(self.token_endpoint.clone())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_url.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("code_verifier", verifier),
            ])
            .send()
            .await
            .map_err(upstream)?;

        if !response.status().is_success() {
            return Err(AppError::Unauthorized(format!(
                "Google token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await.map_err(upstream)?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> AppResult<GoogleProfile> {
        self.http
            .get(self.userinfo_endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(upstream)?
            .json()
            .await
            .map_err(upstream)
    }

    fn flow_cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        // Lax: the callback arrives as a cross-site top-level navigation
        Cookie::build((name, value))
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::minutes(FLOW_MINUTES))
            .build()
    }
}

/// Account for a Google profile, created on first sign-in
///
/// The username is the Google display name, falling back to the email
/// address and then the subject. A name already taken by another account
/// yields `Conflict`.
pub async fn sign_in(state: &AppState, profile: &GoogleProfile) -> AppResult<User> {
    let user = match users::find_by_google_id(&state.db, &profile.sub).await? {
        Some(user) => user,
        None => {
            let username = profile
                .name
                .clone()
                .or_else(|| profile.email.clone())
                .unwrap_or_else(|| format!("google-{}", profile.sub));
            let user = User::from_google(username, profile.email.clone(), profile.sub.clone());
            users::create_user(&state.db, &user).await?;

            tracing::info!(user_id = %user.id, "account created from Google profile");
            user
        }
    };

    users::record_login(&state.db, &user.id).await?;
    tracing::info!(user_id = %user.id, "google login");

    Ok(user)
}

/// PKCE S256 challenge: base64url(SHA-256(verifier)) without padding
pub fn code_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Random string over the PKCE unreserved alphabet
fn random_string(len: usize) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

fn upstream(e: reqwest::Error) -> AppError {
    AppError::Internal(format!("Google request failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn client() -> GoogleOAuth {
        GoogleOAuth::from_config(&testing::google_config()).unwrap().unwrap()
    }

    #[test]
    fn pkce_challenge_matches_rfc_7636() {
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn disabled_without_client_credentials() {
        assert!(GoogleOAuth::from_config(&testing::test_config()).unwrap().is_none());
    }

    #[test]
    fn authorization_url_carries_state_and_challenge() {
        let url = client().authorization_url("st4te", "verifier");
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert!(url.as_str().starts_with(AUTHORIZATION_ENDPOINT));
        assert_eq!(query["client_id"], "client-123");
        assert_eq!(query["state"], "st4te");
        assert_eq!(query["code_challenge"], code_challenge("verifier"));
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query["scope"], SCOPES);
    }

    #[test]
    fn begin_sets_lax_flow_cookies() {
        let (jar, url) = client().begin(CookieJar::new());
        let state = jar.get(STATE_COOKIE).unwrap();
        let verifier = jar.get(VERIFIER_COOKIE).unwrap();

        assert_eq!(state.same_site(), Some(SameSite::Lax));
        assert_eq!(state.http_only(), Some(true));
        assert!(url.as_str().contains(&format!("state={}", state.value())));
        assert!(url
            .as_str()
            .contains(&format!("code_challenge={}", code_challenge(verifier.value()))));
    }

    #[tokio::test]
    async fn mismatched_state_is_refused_before_calling_google() {
        let (jar, _) = client().begin(CookieJar::new());
        let query = CallbackQuery {
            code: Some("code".to_string()),
            state: Some("forged".to_string()),
            error: None,
        };

        assert!(matches!(
            client().complete(&jar, &query).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn sign_in_reuses_the_linked_account() {
        let state = testing::test_state().await;
        let profile = GoogleProfile {
            sub: "g-1".to_string(),
            email: Some("alice@gmail.com".to_string()),
            name: Some("Alice G".to_string()),
        };

        let first = sign_in(&state, &profile).await.unwrap();
        let again = sign_in(&state, &profile).await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(first.auth_method, "google");
        assert_eq!(first.username, "Alice G");
        assert!(users::find_by_id(&state.db, &first.id)
            .await
            .unwrap()
            .last_login_at
            .is_some());
    }
}
