//! Translation of [`OutboundMessage`] into a Graph sendMail payload

use crate::types::*;
use crate::{Attachment, AttachmentSource, GraphError, GraphResult, OutboundMessage};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// What to do when an attachment file cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingAttachmentPolicy {
    /// Leave the attachment out and send the rest of the message
    #[default]
    Skip,
    /// Refuse to build the request
    Fail,
}

/// An attachment left out of the payload under [`MissingAttachmentPolicy::Skip`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAttachment {
    pub path: PathBuf,
    pub reason: String,
}

/// Payload ready to POST plus anything that was dropped along the way
#[derive(Debug, Clone)]
pub struct BuiltRequest {
    pub payload: SendMailRequest,
    pub skipped: Vec<SkippedAttachment>,
}

/// Builds Graph sendMail request bodies
#[derive(Debug, Clone, Default)]
pub struct MailRequestBuilder {
    missing_attachments: MissingAttachmentPolicy,
    save_to_sent_items: Option<bool>,
}

impl MailRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_attachment_policy(mut self, policy: MissingAttachmentPolicy) -> Self {
        self.missing_attachments = policy;
        self
    }

    /// Emit `saveToSentItems`; Graph defaults to true when omitted
    pub fn with_save_to_sent_items(mut self, save: bool) -> Self {
        self.save_to_sent_items = Some(save);
        self
    }

    pub fn missing_attachment_policy(&self) -> MissingAttachmentPolicy {
        self.missing_attachments
    }

    /// Build the sendMail body for `message`
    pub fn build(&self, message: &OutboundMessage) -> GraphResult<BuiltRequest> {
        let to_recipients = recipients(&message.to);
        if to_recipients.is_empty() {
            return Err(GraphError::InvalidMessage(
                "at least one recipient required".to_string(),
            ));
        }

        let mut attachments = Vec::with_capacity(message.attachments.len());
        let mut skipped = Vec::new();

        for attachment in &message.attachments {
            match encode_attachment(attachment) {
                Ok(encoded) => attachments.push(encoded),
                Err(GraphError::AttachmentUnreadable { path, source })
                    if self.missing_attachments == MissingAttachmentPolicy::Skip =>
                {
                    warn!("Skipping attachment {}: {}", path.display(), source);
                    skipped.push(SkippedAttachment {
                        path,
                        reason: source.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let payload = SendMailRequest {
            message: GraphMessage {
                subject: message.subject.clone(),
                body: GraphBody {
                    content_type: message.content_type,
                    content: message.body.clone(),
                },
                from: GraphRecipient {
                    email_address: GraphEmailAddress {
                        address: message.from.trim().to_string(),
                        name: message
                            .from_name
                            .as_ref()
                            .map(|n| n.trim().to_string())
                            .filter(|n| !n.is_empty()),
                    },
                },
                to_recipients,
                cc_recipients: recipients(&message.cc),
                bcc_recipients: recipients(&message.bcc),
                attachments,
            },
            save_to_sent_items: self.save_to_sent_items,
        };

        debug!(
            "Built sendMail payload: to={}, cc={}, bcc={}, attachments={}, skipped={}",
            payload.message.to_recipients.len(),
            payload.message.cc_recipients.len(),
            payload.message.bcc_recipients.len(),
            payload.message.attachments.len(),
            skipped.len()
        );

        Ok(BuiltRequest { payload, skipped })
    }
}

fn recipients(addresses: &[String]) -> Vec<GraphRecipient> {
    addresses
        .iter()
        .map(|addr| addr.trim())
        .filter(|addr| !addr.is_empty())
        .map(GraphRecipient::new)
        .collect()
}

fn encode_attachment(attachment: &Attachment) -> GraphResult<GraphAttachment> {
    let data = match &attachment.source {
        AttachmentSource::Path(path) => {
            std::fs::read(path).map_err(|source| GraphError::AttachmentUnreadable {
                path: path.clone(),
                source,
            })?
        }
        AttachmentSource::Bytes(bytes) => bytes.clone(),
    };

    let name = attachment.display_name();
    let content_type = attachment
        .mime_type
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            mime_guess::from_path(&name)
                .first_or_octet_stream()
                .to_string()
        });

    let engine = base64::engine::general_purpose::STANDARD;
    Ok(GraphAttachment {
        odata_type: FILE_ATTACHMENT_ODATA_TYPE.to_string(),
        name,
        content_type,
        size: data.len() as u64,
        content_bytes: engine.encode(&data),
    })
}
