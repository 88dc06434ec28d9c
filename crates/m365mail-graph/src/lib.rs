//! Microsoft Graph mail sending for m365mail
//!
//! Turns a provider-neutral [`OutboundMessage`] into a Graph `sendMail`
//! call authenticated with an app-only bearer token, and reports the
//! outcome as a [`DispatchResult`].

pub mod builder;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod result;
pub mod types;

pub use builder::{BuiltRequest, MailRequestBuilder, MissingAttachmentPolicy, SkippedAttachment};
pub use dispatcher::{DispatcherConfig, MailDispatcher, DEFAULT_SEND_TIMEOUT, GRAPH_BASE};
pub use error::{GraphError, GraphResult};
pub use message::{Attachment, AttachmentSource, ContentType, OutboundMessage};
pub use result::{DispatchFailure, DispatchResult, FailureKind};
pub use types::*;
