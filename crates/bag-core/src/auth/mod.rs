//! OAuth password-grant client and the shared token cache.
//!
//! Every API call obtains its bearer credential through
//! [`TokenManager::valid_token`]. The manager owns the only copy of the
//! mutable token; callers receive clones.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::ValidatedConfig;
use crate::util::compact_text;

/// Seconds shaved off the server-declared lifetime.
const EXPIRY_SKEW_SECONDS: i64 = 60;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Build a token from a grant response issued at `issued_at`.
    #[must_use]
    pub fn from_grant(
        access_token: impl Into<String>,
        expires_in: i64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let lifetime = expires_in.saturating_sub(EXPIRY_SKEW_SECONDS);
        let expires_at = issued_at
            .checked_add_signed(TimeDelta::seconds(lifetime))
            .unwrap_or(issued_at);
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token API error: {0}")]
    Api(String),
    #[error("Invalid token payload: {0}")]
    InvalidPayload(String),
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Performs the credential exchange that yields a fresh [`Token`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> AuthResult<Token>;
}

/// Password-grant client for `POST {host}/oauth/v2/token`.
#[derive(Clone)]
pub struct OAuthClient {
    token_url: String,
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
    client: Client,
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OAuthClient")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl OAuthClient {
    pub fn new(config: &ValidatedConfig) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: &ValidatedConfig, client: Client) -> Self {
        Self {
            token_url: format!("{}/oauth/v2/token", config.host),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        }
    }
}

#[async_trait]
impl Authenticator for OAuthClient {
    async fn authenticate(&self) -> AuthResult<Token> {
        let form = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];

        tracing::debug!("Requesting access token from {}", self.token_url);
        let response = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        let body = response.text().await?;
        let payload = serde_json::from_str::<TokenResponse>(&body)
            .map_err(|error| AuthError::InvalidPayload(error.to_string()))?;
        payload.into_token(Utc::now())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self, issued_at: DateTime<Utc>) -> AuthResult<Token> {
        let access_token = self
            .access_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AuthError::InvalidPayload("response did not include access_token".to_string())
            })?;
        let expires_in = self.expires_in.ok_or_else(|| {
            AuthError::InvalidPayload("response did not include expires_in".to_string())
        })?;
        Ok(Token::from_grant(access_token, expires_in, issued_at))
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<OAuthErrorBody>(body) {
        if let Some(message) = payload
            .error_description
            .or(payload.message)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[derive(Default)]
struct TokenCache {
    token: Option<Token>,
    /// Attempt number and message of the most recent failed refresh.
    last_failure: Option<(u64, String)>,
}

/// Process-wide owner of the bearer token.
///
/// Refreshes are coalesced: the cache lock is held across the network call,
/// so callers queued behind an in-flight refresh observe its outcome instead
/// of issuing their own request. `completed` only advances under the lock,
/// once a refresh has finished.
pub struct TokenManager {
    authenticator: Arc<dyn Authenticator>,
    cache: Mutex<TokenCache>,
    completed: AtomicU64,
}

impl TokenManager {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            cache: Mutex::new(TokenCache::default()),
            completed: AtomicU64::new(0),
        }
    }

    /// Return the cached token, refreshing it first when absent or expired.
    pub async fn valid_token(&self) -> AuthResult<Token> {
        // Refreshes finished before we queued; anything newer was in flight
        // (or started) while we waited.
        let completed_before = self.completed.load(Ordering::Acquire);
        let mut cache = self.cache.lock().await;

        if let Some(token) = cache.token.as_ref().filter(|token| token.is_valid()) {
            return Ok(token.clone());
        }

        if let Some((attempt, message)) = cache.last_failure.as_ref() {
            if *attempt > completed_before {
                return Err(AuthError::RefreshFailed(message.clone()));
            }
        }

        let attempt = self.completed.load(Ordering::Acquire) + 1;
        let outcome = self.authenticator.authenticate().await;
        match outcome {
            Ok(token) => {
                tracing::debug!("Access token refreshed, expires at {}", token.expires_at);
                cache.token = Some(token.clone());
                cache.last_failure = None;
                self.completed.store(attempt, Ordering::Release);
                Ok(token)
            }
            Err(error) => {
                tracing::warn!("Access token refresh failed: {}", error);
                cache.last_failure = Some((attempt, error.to_string()));
                self.completed.store(attempt, Ordering::Release);
                Err(error)
            }
        }
    }

    /// Drop the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.lock().await;
        cache.token = None;
    }

    /// Whether a non-expired token is cached right now.
    pub async fn has_valid_token(&self) -> bool {
        let cache = self.cache.lock().await;
        cache.token.as_ref().is_some_and(Token::is_valid)
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenManager")
            .field("completed_refreshes", &self.completed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
