//! MailDispatcher tests against WireMock identity and Graph endpoints

use m365mail_auth::{Credentials, TokenProvider, TokenProviderConfig};
use m365mail_graph::{
    DispatchResult, DispatcherConfig, FailureKind, MailDispatcher, MailRequestBuilder,
    MissingAttachmentPolicy, OutboundMessage,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";
const SEND_PATH: &str = r"^/v1\.0/users/a(%40|@)x\.com/sendMail$";

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "access_token": "T",
            "expires_in": 3600
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn token_provider(server: &MockServer) -> Arc<TokenProvider> {
    Arc::new(
        TokenProvider::new(Credentials::new("tenant-1", "client-1", "secret-1")).with_config(
            TokenProviderConfig {
                authority: server.uri(),
                ..Default::default()
            },
        ),
    )
}

fn dispatcher_for(server: &MockServer, tokens: Arc<TokenProvider>) -> MailDispatcher {
    MailDispatcher::new(tokens).with_config(DispatcherConfig {
        base_url: format!("{}/v1.0", server.uri()),
        ..Default::default()
    })
}

fn hello_message() -> OutboundMessage {
    OutboundMessage::new("a@x.com", "Hi").to("b@x.com").text("Hello")
}

#[tokio::test]
async fn test_send_success_returns_202() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .and(header("authorization", "Bearer T"))
        .and(body_json(json!({
            "message": {
                "subject": "Hi",
                "body": { "contentType": "Text", "content": "Hello" },
                "from": { "emailAddress": { "address": "a@x.com" } },
                "toRecipients": [ { "emailAddress": { "address": "b@x.com" } } ]
            }
        })))
        .respond_with(ResponseTemplate::new(202).append_header("request-id", "req-123"))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server, token_provider(&server));
    let result = dispatcher.send(&hello_message()).await;

    match result {
        DispatchResult::Success {
            status,
            headers,
            skipped_attachments,
        } => {
            assert_eq!(status, 202);
            assert!(skipped_attachments.is_empty());
            assert_eq!(headers.get("request-id").map(String::as_str), Some("req-123"));
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_token_is_reused_across_sends() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .respond_with(ResponseTemplate::new(202))
        .expect(3)
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server, token_provider(&server));
    for _ in 0..3 {
        assert!(dispatcher.send(&hello_message()).await.is_success());
    }
}

#[tokio::test]
async fn test_provider_error_is_classified() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "ErrorAccessDenied", "message": "Access denied" }
        })))
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server, token_provider(&server));
    let result = dispatcher.send(&hello_message()).await;

    let failure = result.as_failure().expect("expected failure");
    assert_eq!(
        failure.kind,
        FailureKind::Provider {
            code: "ErrorAccessDenied".to_string()
        }
    );
    assert_eq!(failure.message, "Access denied");
    assert_eq!(failure.status, Some(403));
    assert_eq!(
        failure.payload,
        Some(json!({ "error": { "code": "ErrorAccessDenied", "message": "Access denied" } }))
    );
    assert!(!result.is_retryable());
}

#[tokio::test]
async fn test_throttled_send_is_retryable() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": "ApplicationThrottled", "message": "Too many requests" }
        })))
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server, token_provider(&server));
    let result = dispatcher.send(&hello_message()).await;
    assert!(result.is_retryable());
}

#[tokio::test]
async fn test_token_exchange_failure_skips_send() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "unauthorized_client",
            "error_description": "AADSTS700016: Application not found"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server, token_provider(&server));
    let result = dispatcher.send(&hello_message()).await;

    let failure = result.as_failure().expect("expected failure");
    assert_eq!(failure.kind, FailureKind::Unauthenticated { retryable: false });
    assert!(failure.message.contains("AADSTS700016"));
}

#[tokio::test]
async fn test_unauthorized_response_invalidates_cached_token() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;

    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": "InvalidAuthenticationToken", "message": "Access token has expired." }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let tokens = token_provider(&server);
    let dispatcher = dispatcher_for(&server, tokens.clone());

    let first = dispatcher.send(&hello_message()).await;
    assert_eq!(first.status(), Some(401));
    assert!(tokens.token_expires_at().is_none());

    let second = dispatcher.send(&hello_message()).await;
    assert!(second.is_success());
}

#[tokio::test]
async fn test_timeout_is_transport_failure() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .respond_with(ResponseTemplate::new(202).set_delay(std::time::Duration::from_secs(2)))
        .mount(&server)
        .await;

    let dispatcher = MailDispatcher::new(token_provider(&server)).with_config(DispatcherConfig {
        base_url: format!("{}/v1.0", server.uri()),
        timeout: std::time::Duration::from_millis(200),
    });
    let result = dispatcher.send(&hello_message()).await;

    let failure = result.as_failure().expect("expected failure");
    assert_eq!(failure.kind, FailureKind::Transport);
    assert!(failure.status.is_none());
    assert!(result.is_retryable());
}

#[tokio::test]
async fn test_unreachable_graph_is_transport_failure() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    let dispatcher = MailDispatcher::new(token_provider(&server)).with_config(DispatcherConfig {
        // Nothing listens on port 9 (discard) in the test environment
        base_url: "http://127.0.0.1:9/v1.0".to_string(),
        ..Default::default()
    });
    let result = dispatcher.send(&hello_message()).await;
    assert_eq!(result.as_failure().unwrap().kind, FailureKind::Transport);
}

#[tokio::test]
async fn test_fail_policy_rejects_missing_attachment_before_sending() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server, token_provider(&server)).with_builder(
        MailRequestBuilder::new().with_missing_attachment_policy(MissingAttachmentPolicy::Fail),
    );
    let msg = hello_message().attach_file("/no/such/file.pdf");
    let result = dispatcher.send(&msg).await;

    assert_eq!(result.as_failure().unwrap().kind, FailureKind::InvalidRequest);
}

#[tokio::test]
async fn test_skipped_attachment_still_sends() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .and(body_json(json!({
            "message": {
                "subject": "Hi",
                "body": { "contentType": "Text", "content": "Hello" },
                "from": { "emailAddress": { "address": "a@x.com" } },
                "toRecipients": [ { "emailAddress": { "address": "b@x.com" } } ],
                "ccRecipients": [ { "emailAddress": { "address": "c@x.com" } } ]
            }
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server, token_provider(&server));
    let msg = hello_message().cc("c@x.com").attach_file("/no/such/file.pdf");
    match dispatcher.send(&msg).await {
        DispatchResult::Success {
            skipped_attachments,
            ..
        } => {
            assert_eq!(skipped_attachments.len(), 1);
            assert_eq!(
                skipped_attachments[0].path,
                std::path::PathBuf::from("/no/such/file.pdf")
            );
            assert!(!skipped_attachments[0].reason.is_empty());
        }
        other => panic!("expected success, got {:?}", other),
    }
}
