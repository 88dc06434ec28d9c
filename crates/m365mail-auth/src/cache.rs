//! In-process bearer token cache
//!
//! Holds at most one token per credential set. Refreshing swaps the whole
//! `Arc<CachedToken>`, so a reader sees either the previous token or the new
//! one and never a token paired with the wrong expiry.

use crate::{AuthError, AuthResult};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};

/// Default safety margin subtracted from the expiry (5 minutes)
pub const DEFAULT_EXPIRY_MARGIN_SECS: i64 = 300;

/// A bearer token with its absolute expiry
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Usable while `now < expires_at - margin`
    pub fn is_usable(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now < self.expires_at - margin
    }
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Single-slot token cache
#[derive(Debug)]
pub struct TokenCache {
    slot: RwLock<Option<Arc<CachedToken>>>,
    margin: Duration,
}

impl TokenCache {
    /// Create an empty cache with the default 300 second margin
    pub fn new() -> Self {
        Self::with_margin(Duration::seconds(DEFAULT_EXPIRY_MARGIN_SECS))
    }

    pub fn with_margin(margin: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            margin,
        }
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    fn current(&self) -> Option<Arc<CachedToken>> {
        self.slot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// True iff a token is present and `now < expiry - margin`
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.current()
            .is_some_and(|token| token.is_usable(now, self.margin))
    }

    /// Return the cached token if it is still usable at `now`
    pub fn get(&self, now: DateTime<Utc>) -> AuthResult<String> {
        match self.current() {
            Some(token) if token.is_usable(now, self.margin) => Ok(token.access_token.clone()),
            _ => Err(AuthError::NoValidToken),
        }
    }

    /// Replace the cached token
    pub fn store(&self, access_token: impl Into<String>, expires_at: DateTime<Utc>) {
        let token = Arc::new(CachedToken::new(access_token, expires_at));
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }

    /// Drop the cached token so the next acquisition goes to the network
    pub fn invalidate(&self) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Expiry of the cached token, usable or not
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.current().map(|token| token.expires_at)
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}
