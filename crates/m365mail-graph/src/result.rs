//! Uniform outcome of a send attempt

use crate::SkippedAttachment;
use serde::Serialize;
use std::collections::BTreeMap;

/// Graph error codes that signal throttling or a temporary outage
const TRANSIENT_PROVIDER_CODES: &[&str] = &[
    "TooManyRequests",
    "ApplicationThrottled",
    "MailboxConcurrency",
    "ErrorServerBusy",
    "ServiceNotAvailable",
    "serviceNotAvailable",
    "activityLimitReached",
];

/// Why a send failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureKind {
    /// Caller bug: missing sender, no recipients, unreadable attachment
    InvalidRequest,
    /// No bearer token could be obtained
    Unauthenticated { retryable: bool },
    /// Network failure or timeout calling Graph
    Transport,
    /// Graph rejected the request
    Provider { code: String },
}

/// Details of a failed send
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchFailure {
    pub kind: FailureKind,
    pub message: String,
    /// HTTP status from Graph, when a response was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Raw provider error body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl DispatchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            payload: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Whether the caller may retry with backoff. Retrying a send can
    /// deliver twice, so this only flags failures where that is the lesser risk.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            FailureKind::InvalidRequest => false,
            FailureKind::Unauthenticated { retryable } => *retryable,
            FailureKind::Transport => true,
            FailureKind::Provider { code } => {
                matches!(self.status, Some(429 | 503 | 504))
                    || TRANSIENT_PROVIDER_CODES.contains(&code.as_str())
            }
        }
    }
}

/// Result of [`crate::MailDispatcher::send`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchResult {
    Success {
        status: u16,
        headers: BTreeMap<String, String>,
        /// Attachments left out because their files could not be read
        #[serde(skip_serializing_if = "Vec::is_empty")]
        skipped_attachments: Vec<SkippedAttachment>,
    },
    Failure(DispatchFailure),
}

impl DispatchResult {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        DispatchResult::Failure(DispatchFailure::new(kind, message))
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::InvalidRequest, message)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DispatchResult::Success { .. })
    }

    /// HTTP status from Graph, if the request got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchResult::Success { status, .. } => Some(*status),
            DispatchResult::Failure(failure) => failure.status,
        }
    }

    pub fn as_failure(&self) -> Option<&DispatchFailure> {
        match self {
            DispatchResult::Success { .. } => None,
            DispatchResult::Failure(failure) => Some(failure),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.as_failure().is_some_and(DispatchFailure::is_retryable)
    }
}
