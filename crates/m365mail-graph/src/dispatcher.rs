//! End-to-end send through Microsoft Graph
//!
//! Validation → token → payload → POST /users/{from}/sendMail → classification.
//! Nothing here retries: a repeated sendMail can deliver the message twice,
//! so retry policy is left to the caller.

use crate::types::GraphErrorResponse;
use crate::{DispatchFailure, DispatchResult, FailureKind, MailRequestBuilder, OutboundMessage};
use m365mail_auth::TokenSource;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Timeout applied to the sendMail request
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Code reported when Graph's error body cannot be parsed
pub const UNKNOWN_ERROR_CODE: &str = "unknown_error";

/// Endpoint and timing settings for sendMail
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Graph API base URL, without trailing slash
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            base_url: GRAPH_BASE.to_string(),
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Sends [`OutboundMessage`]s through Graph using app-only tokens
pub struct MailDispatcher {
    tokens: Arc<dyn TokenSource>,
    builder: MailRequestBuilder,
    config: DispatcherConfig,
    client: reqwest::Client,
}

impl MailDispatcher {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            tokens,
            builder: MailRequestBuilder::new(),
            config: DispatcherConfig::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_builder(mut self, builder: MailRequestBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn builder(&self) -> &MailRequestBuilder {
        &self.builder
    }

    /// URL of the sendMail action for `from`
    pub fn send_mail_url(&self, from: &str) -> String {
        format!(
            "{}/users/{}/sendMail",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(from.trim())
        )
    }

    /// Send `message`, returning a classified outcome
    pub async fn send(&self, message: &OutboundMessage) -> DispatchResult {
        if message.from.trim().is_empty() {
            return DispatchResult::invalid_request("from address required");
        }
        if !message.has_recipients() {
            return DispatchResult::invalid_request("at least one recipient required");
        }

        let token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!("Graph: could not obtain access token: {}", e);
                return DispatchResult::failure(
                    FailureKind::Unauthenticated {
                        retryable: e.is_retryable(),
                    },
                    e.to_string(),
                );
            }
        };

        let built = match self.builder.build(message) {
            Ok(built) => built,
            Err(e) => return DispatchResult::invalid_request(e.to_string()),
        };

        let url = self.send_mail_url(&message.from);
        debug!(
            "Graph: sendMail as {} to {} recipient(s), {} attachment(s)",
            message.from,
            built.payload.message.to_recipients.len(),
            built.payload.message.attachments.len()
        );

        let response = match self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.config.timeout)
            .json(&built.payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Graph: sendMail request failed: {}", e);
                let message = if e.is_timeout() {
                    format!("Graph API request timed out: {}", e)
                } else {
                    format!("Graph API request failed: {}", e)
                };
                return DispatchResult::failure(FailureKind::Transport, message);
            }
        };

        let status = response.status();
        if status.is_success() {
            info!("Graph: email sent (status {})", status);
            return DispatchResult::Success {
                status: status.as_u16(),
                headers: collect_headers(response.headers()),
                skipped_attachments: built.skipped,
            };
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Token was revoked or rejected; the next send should fetch a new one
            self.tokens.invalidate();
        }

        let failure = match response.text().await {
            Ok(body) => classify_error(status.as_u16(), &body),
            Err(e) => unread_body_failure(status.as_u16(), e),
        };
        warn!(
            "Graph: sendMail rejected with {}: {}",
            status, failure.message
        );
        DispatchResult::Failure(failure)
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Turn a non-2xx Graph response into a failure
fn classify_error(status: u16, body: &str) -> DispatchFailure {
    let raw: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let parsed = raw
        .clone()
        .and_then(|value| serde_json::from_value::<GraphErrorResponse>(value).ok());

    let (code, message) = match parsed {
        Some(envelope) => (
            envelope.error.code,
            envelope.error.message.filter(|m| !m.is_empty()),
        ),
        None => (None, None),
    };

    let failure = DispatchFailure::new(
        FailureKind::Provider {
            code: code.unwrap_or_else(|| UNKNOWN_ERROR_CODE.to_string()),
        },
        message.unwrap_or_else(|| format!("Graph API returned {}: failed to send email", status)),
    )
    .with_status(status);

    match raw {
        Some(value) => failure.with_payload(value),
        None if !body.is_empty() => {
            failure.with_payload(serde_json::Value::String(body.to_string()))
        }
        None => failure,
    }
}

/// Graph answered with an error status but the body could not be read
fn unread_body_failure(status: u16, error: impl std::fmt::Display) -> DispatchFailure {
    DispatchFailure::new(
        FailureKind::Transport,
        format!("Graph API returned {}; reading the response failed: {}", status, error),
    )
    .with_status(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MissingAttachmentPolicy;
    use m365mail_auth::MockTokenSource;

    #[test]
    fn test_send_mail_url_encodes_sender() {
        let dispatcher = MailDispatcher::new(Arc::new(MockTokenSource::with_token("T")));
        assert_eq!(
            dispatcher.send_mail_url("a@x.com"),
            "https://graph.microsoft.com/v1.0/users/a%40x.com/sendMail"
        );
        assert_eq!(
            dispatcher.send_mail_url("first last+tag@x.com"),
            "https://graph.microsoft.com/v1.0/users/first%20last%2Btag%40x.com/sendMail"
        );
    }

    #[test]
    fn test_classify_graph_error() {
        let failure = classify_error(
            403,
            r#"{"error":{"code":"ErrorAccessDenied","message":"Access denied"}}"#,
        );
        assert_eq!(
            failure.kind,
            FailureKind::Provider {
                code: "ErrorAccessDenied".into()
            }
        );
        assert_eq!(failure.message, "Access denied");
        assert_eq!(failure.status, Some(403));
        assert!(failure.payload.is_some());
    }

    #[test]
    fn test_classify_unparsable_error() {
        let failure = classify_error(502, "<html>bad gateway</html>");
        assert_eq!(
            failure.kind,
            FailureKind::Provider {
                code: UNKNOWN_ERROR_CODE.into()
            }
        );
        assert!(failure.message.contains("502"));
        assert_eq!(
            failure.payload,
            Some(serde_json::Value::String("<html>bad gateway</html>".into()))
        );

        let failure = classify_error(500, "");
        assert!(failure.payload.is_none());
    }

    #[test]
    fn test_classify_json_without_error_envelope() {
        let failure = classify_error(400, r#"{"unexpected":true}"#);
        assert_eq!(
            failure.kind,
            FailureKind::Provider {
                code: UNKNOWN_ERROR_CODE.into()
            }
        );
        assert!(failure.message.contains("400"));
    }

    #[test]
    fn test_unread_error_body_is_transport_failure() {
        let failure = unread_body_failure(502, "connection reset");
        assert_eq!(failure.kind, FailureKind::Transport);
        assert_eq!(failure.status, Some(502));
        assert!(failure.message.contains("connection reset"));
        assert!(failure.payload.is_none());
        assert!(failure.is_retryable());
    }

    #[test]
    fn test_builder_settings_are_kept() {
        let dispatcher = MailDispatcher::new(Arc::new(MockTokenSource::with_token("T")))
            .with_builder(
                MailRequestBuilder::new()
                    .with_missing_attachment_policy(MissingAttachmentPolicy::Fail),
            );
        assert_eq!(
            dispatcher.builder().missing_attachment_policy(),
            MissingAttachmentPolicy::Fail
        );
        assert_eq!(
            MailDispatcher::new(Arc::new(MockTokenSource::with_token("T")))
                .builder()
                .missing_attachment_policy(),
            MissingAttachmentPolicy::Skip
        );
    }

    #[tokio::test]
    async fn test_empty_to_fails_without_token() {
        let tokens = Arc::new(MockTokenSource::with_token("T"));
        let dispatcher = MailDispatcher::new(tokens.clone());

        let msg = OutboundMessage::new("a@x.com", "Hi").text("Hello");
        let result = dispatcher.send(&msg).await;

        assert_eq!(
            result.as_failure().map(|f| &f.kind),
            Some(&FailureKind::InvalidRequest)
        );
        assert_eq!(
            result.as_failure().unwrap().message,
            "at least one recipient required"
        );
        assert_eq!(tokens.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_from_fails_without_token() {
        let tokens = Arc::new(MockTokenSource::with_token("T"));
        let dispatcher = MailDispatcher::new(tokens.clone());

        let msg = OutboundMessage::new("", "Hi").to("b@x.com");
        let result = dispatcher.send(&msg).await;

        assert_eq!(
            result.as_failure().unwrap().message,
            "from address required"
        );
        assert_eq!(tokens.call_count(), 0);
    }

    #[tokio::test]
    async fn test_token_failure_is_unauthenticated() {
        let tokens = Arc::new(MockTokenSource::unconfigured());
        let dispatcher = MailDispatcher::new(tokens.clone());

        let msg = OutboundMessage::new("a@x.com", "Hi").to("b@x.com");
        let result = dispatcher.send(&msg).await;

        assert_eq!(
            result.as_failure().unwrap().kind,
            FailureKind::Unauthenticated { retryable: false }
        );
        assert!(!result.is_retryable());
        assert_eq!(tokens.call_count(), 1);
    }
}
