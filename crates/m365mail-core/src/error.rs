//! Error types for the core module

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Token acquisition failed
    #[error("Authentication error: {0}")]
    Auth(#[from] m365mail_auth::AuthError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
