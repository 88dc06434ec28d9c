//! OAuth2 client-credentials token provider
//!
//! Exchanges the app registration's client ID and secret for an access token
//! at the Microsoft identity platform (RFC 6749 section 4.4) and keeps the
//! result in a [`TokenCache`] until it is about to expire.

use crate::{AuthError, AuthResult, Clock, Credentials, SystemClock, TokenCache};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Microsoft identity platform authority
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Scope granting the app's configured Graph application permissions
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Lifetime assumed when the token response has no `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Longest token lifetime accepted from the identity endpoint
pub const MAX_EXPIRES_IN_SECS: i64 = 366 * 24 * 3600;

/// Timeout applied to the token request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can hand out a bearer token for Graph calls
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a bearer token that is valid right now
    async fn access_token(&self) -> AuthResult<String>;

    /// Forget any cached token
    fn invalidate(&self) {}
}

/// Endpoint and timing settings for the token exchange
#[derive(Debug, Clone)]
pub struct TokenProviderConfig {
    /// Identity authority base URL (tenant is appended)
    pub authority: String,
    /// Requested scope
    pub scope: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for TokenProviderConfig {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            scope: GRAPH_DEFAULT_SCOPE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Successful token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    /// Some endpoints send this as a string
    expires_in: Option<serde_json::Value>,
}

/// Error body returned by the token endpoint
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// Acquires and caches client-credentials access tokens
pub struct TokenProvider {
    credentials: Credentials,
    config: TokenProviderConfig,
    client: reqwest::Client,
    cache: Arc<TokenCache>,
    clock: Arc<dyn Clock>,
    refresh_lock: Mutex<()>,
}

impl TokenProvider {
    /// Create a provider with default endpoints, a fresh cache and the wall clock
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            config: TokenProviderConfig::default(),
            client: reqwest::Client::new(),
            cache: Arc::new(TokenCache::new()),
            clock: Arc::new(SystemClock),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Override endpoints and timeout
    pub fn with_config(mut self, config: TokenProviderConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an externally owned cache
    pub fn with_cache(mut self, cache: Arc<TokenCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Use a different time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Reuse an existing HTTP client (connection pool)
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    /// Return a valid bearer token, exchanging credentials only when the
    /// cached token is missing or inside the expiry margin.
    pub async fn get_token(&self) -> AuthResult<String> {
        if let Ok(token) = self.cache.get(self.clock.now()) {
            debug!("Using cached access token");
            return Ok(token);
        }

        // One exchange at a time; waiters pick up the refreshed token
        let _guard = self.refresh_lock.lock().await;
        if let Ok(token) = self.cache.get(self.clock.now()) {
            debug!("Access token refreshed by a concurrent caller");
            return Ok(token);
        }

        self.credentials.validate()?;

        let issued_at = self.clock.now();
        let (access_token, expires_in) = self.exchange().await?;
        let expires_at = chrono::Duration::try_seconds(expires_in)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::MalformedResponse(format!("expires_in out of range: {}", expires_in))
            })?;
        self.cache.store(access_token.clone(), expires_at);

        info!(
            "Acquired access token for tenant {} (expires in {}s)",
            self.credentials.tenant_id(),
            expires_in
        );
        Ok(access_token)
    }

    /// Drop the cached token
    pub fn invalidate(&self) {
        debug!("Invalidating cached access token");
        self.cache.invalidate();
    }

    /// Expiry of the cached token, if one is held
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.cache.expires_at()
    }

    fn token_url(&self) -> AuthResult<url::Url> {
        let mut url = url::Url::parse(&self.config.authority)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid authority URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                AuthError::InvalidConfig(format!(
                    "Authority URL is not hierarchical: {}",
                    self.config.authority
                ))
            })?
            .pop_if_empty()
            .extend([
                self.credentials.tenant_id(),
                "oauth2",
                "v2.0",
                "token",
            ]);
        Ok(url)
    }

    /// Perform the client-credentials exchange. Returns the token and its
    /// lifetime in seconds.
    async fn exchange(&self) -> AuthResult<(String, i64)> {
        let url = self.token_url()?;
        debug!("Requesting access token from {}", url);

        let params = [
            ("client_id", self.credentials.client_id()),
            (
                "client_secret",
                self.credentials.client_secret().expose_secret().as_str(),
            ),
            ("grant_type", "client_credentials"),
            ("scope", self.config.scope.as_str()),
        ];

        let response = self
            .client
            .post(url)
            .timeout(self.config.timeout)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let error = token_exchange_error(status.as_u16(), &body);
            warn!("Token exchange rejected: {}", error);
            return Err(error);
        }

        parse_token_response(&body)
    }
}

#[async_trait]
impl TokenSource for TokenProvider {
    async fn access_token(&self) -> AuthResult<String> {
        self.get_token().await
    }

    fn invalidate(&self) {
        TokenProvider::invalidate(self);
    }
}

fn parse_token_response(body: &str) -> AuthResult<(String, i64)> {
    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|e| AuthError::MalformedResponse(format!("Invalid JSON: {}", e)))?;

    let access_token = parsed
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::MalformedResponse("No access token in response".to_string()))?;

    let expires_in = parsed
        .expires_in
        .as_ref()
        .and_then(|value| {
            value
                .as_i64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        })
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS);

    if !(1..=MAX_EXPIRES_IN_SECS).contains(&expires_in) {
        return Err(AuthError::MalformedResponse(format!(
            "expires_in out of range: {}",
            expires_in
        )));
    }

    Ok((access_token, expires_in))
}

fn token_exchange_error(status: u16, body: &str) -> AuthError {
    let parsed = serde_json::from_str::<TokenErrorResponse>(body).ok();
    let code = parsed.as_ref().and_then(|e| e.error.clone());
    let description = parsed
        .and_then(|e| e.error_description)
        .unwrap_or_else(|| "Failed to obtain access token".to_string());

    AuthError::TokenExchange {
        status,
        code,
        description,
    }
}

/// Provider stand-in that hands out a fixed token and counts calls
#[derive(Default)]
pub struct MockTokenSource {
    token: Option<String>,
    calls: std::sync::atomic::AtomicUsize,
    invalidations: std::sync::atomic::AtomicUsize,
}

impl MockTokenSource {
    /// Always succeed with `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Default::default()
        }
    }

    /// Always fail with `MissingConfiguration`
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn invalidation_count(&self) -> usize {
        self.invalidations.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for MockTokenSource {
    async fn access_token(&self) -> AuthResult<String> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.token.clone().ok_or_else(|| {
            AuthError::MissingConfiguration("client ID is not set".to_string())
        })
    }

    fn invalidate(&self) {
        self.invalidations
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}
