//! Mailer configuration
//!
//! Loaded from `M365_*` environment variables or a TOML file. Every field
//! has a default, so a partial file or environment is accepted and
//! [`MailerConfig::is_configured`] decides whether sending is possible.

use crate::{CoreError, CoreResult};
use m365mail_auth::{
    Credentials, TokenProviderConfig, DEFAULT_AUTHORITY, DEFAULT_TENANT, GRAPH_DEFAULT_SCOPE,
};
use m365mail_graph::{DispatcherConfig, MailRequestBuilder, MissingAttachmentPolicy, GRAPH_BASE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const ENV_TENANT_ID: &str = "M365_OAUTH2_SMTP_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "M365_OAUTH2_SMTP_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "M365_OAUTH2_SMTP_CLIENT_SECRET";
pub const ENV_FROM_EMAIL: &str = "M365_MAILER_FROM_EMAIL";
pub const ENV_FROM_NAME: &str = "M365_MAILER_FROM_NAME";
pub const ENV_ENABLE_LOGGING: &str = "M365_MAILER_ENABLE_LOGGING";
pub const ENV_LOG_RETENTION_DAYS: &str = "M365_MAILER_LOG_RETENTION_DAYS";
pub const ENV_SAVE_TO_SENT_ITEMS: &str = "M365_MAILER_SAVE_TO_SENT_ITEMS";
pub const ENV_MISSING_ATTACHMENTS: &str = "M365_MAILER_MISSING_ATTACHMENTS";
pub const ENV_AUTHORITY: &str = "M365_MAILER_AUTHORITY";
pub const ENV_GRAPH_BASE_URL: &str = "M365_MAILER_GRAPH_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "M365_MAILER_TIMEOUT_SECS";

/// Days of delivery history kept by default
pub const DEFAULT_LOG_RETENTION_DAYS: i64 = 30;

/// Timeout for both the token exchange and sendMail
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Everything needed to acquire tokens and send mail
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailerConfig {
    /// Directory (tenant) ID
    pub tenant_id: String,
    /// Application (client) ID
    pub client_id: String,
    pub client_secret: SecretString,
    /// Sender used when a message has none
    pub from_email: String,
    /// Display name used when a message has none
    pub from_name: Option<String>,
    /// Record every dispatch in the delivery log
    pub enable_logging: bool,
    /// Delivery records older than this are removed by cleanup; 0 keeps everything
    pub log_retention_days: i64,
    /// Graph `saveToSentItems`; omitted from requests when unset
    pub save_to_sent_items: Option<bool>,
    pub missing_attachments: MissingAttachmentPolicy,
    /// Identity authority base URL
    pub authority: String,
    /// Graph API base URL
    pub graph_base_url: String,
    pub timeout_secs: u64,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            tenant_id: DEFAULT_TENANT.to_string(),
            client_id: String::new(),
            client_secret: SecretString::new(String::new()),
            from_email: String::new(),
            from_name: None,
            enable_logging: true,
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
            save_to_sent_items: None,
            missing_attachments: MissingAttachmentPolicy::default(),
            authority: DEFAULT_AUTHORITY.to_string(),
            graph_base_url: GRAPH_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl MailerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source using the environment
    /// variable names. Unset and blank values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let config = Self {
            tenant_id: get(ENV_TENANT_ID).unwrap_or(defaults.tenant_id),
            client_id: get(ENV_CLIENT_ID).unwrap_or_default(),
            client_secret: SecretString::new(get(ENV_CLIENT_SECRET).unwrap_or_default()),
            from_email: get(ENV_FROM_EMAIL).unwrap_or_default(),
            from_name: get(ENV_FROM_NAME),
            enable_logging: match get(ENV_ENABLE_LOGGING) {
                Some(value) => parse_bool(ENV_ENABLE_LOGGING, &value)?,
                None => defaults.enable_logging,
            },
            log_retention_days: match get(ENV_LOG_RETENTION_DAYS) {
                Some(value) => value
                    .parse()
                    .map_err(|_| invalid(ENV_LOG_RETENTION_DAYS, &value))?,
                None => defaults.log_retention_days,
            },
            save_to_sent_items: get(ENV_SAVE_TO_SENT_ITEMS)
                .map(|value| parse_bool(ENV_SAVE_TO_SENT_ITEMS, &value))
                .transpose()?,
            missing_attachments: match get(ENV_MISSING_ATTACHMENTS) {
                Some(value) => parse_policy(&value)?,
                None => defaults.missing_attachments,
            },
            authority: get(ENV_AUTHORITY).unwrap_or(defaults.authority),
            graph_base_url: get(ENV_GRAPH_BASE_URL).unwrap_or(defaults.graph_base_url),
            timeout_secs: match get(ENV_TIMEOUT_SECS) {
                Some(value) => value.parse().map_err(|_| invalid(ENV_TIMEOUT_SECS, &value))?,
                None => defaults.timeout_secs,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Reject values that parse but cannot work
    pub fn validate(&self) -> CoreResult<()> {
        if self.timeout_secs == 0 {
            return Err(CoreError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Client ID and secret are both present
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.expose_secret().trim().is_empty()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.tenant_id.trim(),
            self.client_id.trim(),
            self.client_secret.expose_secret().trim(),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn token_provider_config(&self) -> TokenProviderConfig {
        TokenProviderConfig {
            authority: self.authority.clone(),
            scope: GRAPH_DEFAULT_SCOPE.to_string(),
            timeout: self.timeout(),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            base_url: self.graph_base_url.clone(),
            timeout: self.timeout(),
        }
    }

    pub fn request_builder(&self) -> MailRequestBuilder {
        let builder =
            MailRequestBuilder::new().with_missing_attachment_policy(self.missing_attachments);
        match self.save_to_sent_items {
            Some(save) => builder.with_save_to_sent_items(save),
            None => builder,
        }
    }
}

fn invalid(key: &str, value: &str) -> CoreError {
    CoreError::Config(format!("Invalid {}: {:?}", key, value))
}

fn parse_bool(key: &str, value: &str) -> CoreResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_policy(value: &str) -> CoreResult<MissingAttachmentPolicy> {
    match value.to_ascii_lowercase().as_str() {
        "skip" => Ok(MissingAttachmentPolicy::Skip),
        "fail" => Ok(MissingAttachmentPolicy::Fail),
        _ => Err(invalid(ENV_MISSING_ATTACHMENTS, value)),
    }
}
