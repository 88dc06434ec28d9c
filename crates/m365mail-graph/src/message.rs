//! Provider-neutral outbound message

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Body format of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "HTML")]
    Html,
    #[default]
    #[serde(rename = "Text")]
    Text,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Html => "HTML",
            ContentType::Text => "Text",
        }
    }
}

/// Where attachment bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// Local file, read when the request is built
    Path(PathBuf),
    /// Bytes already in memory
    Bytes(Vec<u8>),
}

/// An attachment reference on an outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub source: AttachmentSource,
    /// Name shown to the recipient; defaults to the file's basename
    pub filename: Option<String>,
    /// MIME type; detected from the name when absent
    pub mime_type: Option<String>,
}

impl Attachment {
    /// Attach a local file
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: AttachmentSource::Path(path.into()),
            filename: None,
            mime_type: None,
        }
    }

    /// Attach in-memory data
    pub fn from_bytes(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            source: AttachmentSource::Bytes(data),
            filename: Some(filename.into()),
            mime_type: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Name to present: explicit filename, else the path's basename
    pub fn display_name(&self) -> String {
        if let Some(ref name) = self.filename {
            return name.clone();
        }
        match &self.source {
            AttachmentSource::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string()),
            AttachmentSource::Bytes(_) => "attachment".to_string(),
        }
    }

    /// Path of a file-backed attachment
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            AttachmentSource::Path(path) => Some(path),
            AttachmentSource::Bytes(_) => None,
        }
    }
}

/// Email message to send
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    /// Sender mailbox; also selects the Graph user that sends
    pub from: String,
    /// Sender display name
    pub from_name: Option<String>,
    /// To addresses, in order
    pub to: Vec<String>,
    /// CC addresses
    pub cc: Vec<String>,
    /// BCC addresses
    pub bcc: Vec<String>,
    /// Subject line
    pub subject: String,
    /// Body, sent as-is
    pub body: String,
    /// HTML or plain text
    pub content_type: ContentType,
    /// File attachments
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    /// Create a new message builder
    pub fn new(from: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    /// Set the from display name
    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = Some(name.into());
        self
    }

    /// Add a To recipient
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Add a CC recipient
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    /// Add a BCC recipient
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    /// Set a plain text body
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.content_type = ContentType::Text;
        self
    }

    /// Set an HTML body
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.content_type = ContentType::Html;
        self
    }

    /// Add an attachment
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Add a local file as an attachment
    pub fn attach_file(self, path: impl Into<PathBuf>) -> Self {
        self.attachment(Attachment::from_path(path))
    }

    /// At least one non-blank To address
    pub fn has_recipients(&self) -> bool {
        self.to.iter().any(|addr| !addr.trim().is_empty())
    }
}
