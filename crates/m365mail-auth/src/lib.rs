//! Authentication module for m365mail
//!
//! Provides OAuth2 client-credentials access tokens for Microsoft Graph:
//! 1. [`TokenCache`] - single cached bearer token with an expiry safety margin
//! 2. [`TokenProvider`] - exchanges app credentials for a token when the cache is stale

mod cache;
mod clock;
mod credentials;
mod error;
mod provider;

pub use cache::{CachedToken, TokenCache, DEFAULT_EXPIRY_MARGIN_SECS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{Credentials, DEFAULT_TENANT};
pub use error::{AuthError, AuthResult};
pub use provider::{
    MockTokenSource, TokenProvider, TokenProviderConfig, TokenSource, DEFAULT_AUTHORITY,
    DEFAULT_EXPIRES_IN_SECS, DEFAULT_TIMEOUT, GRAPH_DEFAULT_SCOPE, MAX_EXPIRES_IN_SECS,
};
