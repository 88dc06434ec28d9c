//! Error types for the auth module

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur while acquiring an access token
#[derive(Debug, Error)]
pub enum AuthError {
    /// Client ID, client secret or tenant is missing
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// Network failure or timeout talking to the identity endpoint
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Identity endpoint rejected the client-credentials exchange
    #[error("Token exchange failed ({status}): {description}")]
    TokenExchange {
        status: u16,
        code: Option<String>,
        description: String,
    },

    /// Identity endpoint answered 2xx but without a usable token
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    /// Cache holds no token usable at the requested instant
    #[error("No valid token in cache")]
    NoValidToken,

    /// Endpoint URL could not be built
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// OAuth2 error codes that indicate the identity provider is throttling
    /// or temporarily unavailable.
    const TRANSIENT_CODES: &'static [&'static str] =
        &["temporarily_unavailable", "server_error", "slow_down"];

    /// Whether the caller may retry the operation later with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthError::Transport(_) | AuthError::MalformedResponse(_) => true,
            AuthError::TokenExchange { status, code, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
                    || code
                        .as_deref()
                        .is_some_and(|c| Self::TRANSIENT_CODES.contains(&c))
            }
            AuthError::MissingConfiguration(_)
            | AuthError::NoValidToken
            | AuthError::InvalidConfig(_) => false,
        }
    }

    /// Provider error code, when the identity endpoint supplied one
    pub fn code(&self) -> Option<&str> {
        match self {
            AuthError::TokenExchange { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
