//! Application credentials for the client-credentials grant

use crate::{AuthError, AuthResult};
use secrecy::{ExposeSecret, SecretString};

/// Tenant used when none is configured
pub const DEFAULT_TENANT: &str = "common";

/// Tenant, client ID and client secret of an app registration
#[derive(Debug, Clone)]
pub struct Credentials {
    tenant_id: String,
    client_id: String,
    client_secret: SecretString,
}

impl Credentials {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }

    /// Credentials for the multi-tenant `common` endpoint
    pub fn common(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::new(DEFAULT_TENANT, client_id, client_secret)
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    /// Client ID and secret both present
    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    /// Check that every value needed for a token exchange is present
    pub fn validate(&self) -> AuthResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::MissingConfiguration(
                "client ID is not set".to_string(),
            ));
        }
        if self.client_secret.expose_secret().trim().is_empty() {
            return Err(AuthError::MissingConfiguration(
                "client secret is not set".to_string(),
            ));
        }
        if self.tenant_id.trim().is_empty() {
            return Err(AuthError::MissingConfiguration(
                "tenant ID is not set".to_string(),
            ));
        }
        Ok(())
    }
}
