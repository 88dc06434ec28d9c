//! Host-side mail facade
//!
//! Wires configuration, the token provider and the Graph dispatcher
//! together, applies sender defaults and records each attempt in the
//! [`DeliveryLog`].

use crate::{CoreResult, DeliveryLog, DeliveryRecord, MailerConfig};
use chrono::{DateTime, Utc};
use m365mail_auth::{AuthError, Clock, SystemClock, TokenProvider};
use m365mail_graph::{DispatchResult, MailDispatcher, OutboundMessage};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_TEST_SUBJECT: &str = "Test Email from m365mail";
pub const DEFAULT_TEST_BODY: &str =
    "This is a test email sent via a Microsoft 365 OAuth2 app registration.";

/// Sends mail through Microsoft Graph with the configured app registration
pub struct Mailer {
    config: MailerConfig,
    tokens: Arc<TokenProvider>,
    dispatcher: MailDispatcher,
    log: Arc<DeliveryLog>,
    clock: Arc<dyn Clock>,
}

impl Mailer {
    pub fn new(config: MailerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a mailer whose token expiry and log timestamps follow `clock`
    pub fn with_clock(config: MailerConfig, clock: Arc<dyn Clock>) -> Self {
        let client = reqwest::Client::new();
        let tokens = Arc::new(
            TokenProvider::new(config.credentials())
                .with_config(config.token_provider_config())
                .with_clock(clock.clone())
                .with_http_client(client.clone()),
        );
        let dispatcher = MailDispatcher::new(tokens.clone())
            .with_builder(config.request_builder())
            .with_config(config.dispatcher_config())
            .with_http_client(client);

        Self {
            config,
            tokens,
            dispatcher,
            log: Arc::new(DeliveryLog::new()),
            clock,
        }
    }

    /// Share a delivery log with other components
    pub fn with_delivery_log(mut self, log: Arc<DeliveryLog>) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &MailerConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn delivery_log(&self) -> &Arc<DeliveryLog> {
        &self.log
    }

    /// Fill in the configured sender where the message has none
    pub fn apply_defaults(&self, mut message: OutboundMessage) -> OutboundMessage {
        if message.from.trim().is_empty() {
            message.from = self.config.from_email.clone();
        }
        let has_name = message
            .from_name
            .as_ref()
            .is_some_and(|name| !name.trim().is_empty());
        if !has_name {
            message.from_name = self.config.from_name.clone();
        }
        message
    }

    /// Send `message` and record the outcome
    pub async fn send(&self, message: OutboundMessage) -> DispatchResult {
        let message = self.apply_defaults(message);
        let result = self.dispatcher.send(&message).await;

        match &result {
            DispatchResult::Success {
                status,
                skipped_attachments,
                ..
            } => {
                info!(
                    "Sent \"{}\" from {} (status {})",
                    message.subject, message.from, status
                );
                for skipped in skipped_attachments {
                    warn!(
                        "\"{}\" was sent without {}: {}",
                        message.subject,
                        skipped.path.display(),
                        skipped.reason
                    );
                }
            }
            DispatchResult::Failure(failure) => {
                warn!(
                    "Failed to send \"{}\" from {}: {}",
                    message.subject, message.from, failure.message
                );
            }
        }

        if self.config.enable_logging {
            self.log.record(DeliveryRecord::from_result(
                &message,
                &result,
                self.clock.now(),
            ));
        }
        result
    }

    /// Send a plain-text test message from the default sender
    pub async fn send_test(
        &self,
        to: &str,
        subject: Option<&str>,
        body: Option<&str>,
    ) -> DispatchResult {
        let message = OutboundMessage::new(
            self.config.from_email.clone(),
            subject.unwrap_or(DEFAULT_TEST_SUBJECT),
        )
        .to(to)
        .text(body.unwrap_or(DEFAULT_TEST_BODY));
        self.send(message).await
    }

    /// Acquire a token and report when it expires. The token itself is
    /// never returned.
    pub async fn check_token(&self) -> CoreResult<DateTime<Utc>> {
        self.tokens.get_token().await?;
        Ok(self
            .tokens
            .token_expires_at()
            .ok_or(AuthError::NoValidToken)?)
    }

    /// Apply the configured retention to the delivery log
    pub fn cleanup_delivery_log(&self) -> usize {
        self.log
            .cleanup_older_than(self.config.log_retention_days, self.clock.now())
    }
}
