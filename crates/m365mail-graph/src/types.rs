use crate::ContentType;
use serde::{Deserialize, Serialize};

/// Discriminator Graph uses for inline file attachments
pub const FILE_ATTACHMENT_ODATA_TYPE: &str = "#microsoft.graph.fileAttachment";

/// Request body for POST /users/{id}/sendMail
#[derive(Debug, Clone, Serialize)]
pub struct SendMailRequest {
    pub message: GraphMessage,
    #[serde(rename = "saveToSentItems", skip_serializing_if = "Option::is_none")]
    pub save_to_sent_items: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphMessage {
    pub subject: String,
    pub body: GraphBody,
    pub from: GraphRecipient,
    #[serde(rename = "toRecipients")]
    pub to_recipients: Vec<GraphRecipient>,
    /// Graph rejects empty recipient arrays, so these are left out when empty
    #[serde(rename = "ccRecipients", skip_serializing_if = "Vec::is_empty")]
    pub cc_recipients: Vec<GraphRecipient>,
    #[serde(rename = "bccRecipients", skip_serializing_if = "Vec::is_empty")]
    pub bcc_recipients: Vec<GraphRecipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<GraphAttachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphBody {
    #[serde(rename = "contentType")]
    pub content_type: ContentType,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphRecipient {
    #[serde(rename = "emailAddress")]
    pub email_address: GraphEmailAddress,
}

impl GraphRecipient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            email_address: GraphEmailAddress {
                address: address.into(),
                name: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphEmailAddress {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphAttachment {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    pub name: String,
    pub content_type: String,
    pub content_bytes: String,
    pub size: u64,
}

/// Error envelope returned by Graph on failure
#[derive(Debug, Deserialize)]
pub struct GraphErrorResponse {
    pub error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorDetail {
    pub code: Option<String>,
    pub message: Option<String>,
}
