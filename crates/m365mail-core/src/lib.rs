//! Core mail facade for m365mail
//!
//! Provides configuration loading, the [`Mailer`] entry point and the
//! in-memory delivery log.

mod config;
mod delivery_log;
mod error;
mod mailer;

pub use config::*;
pub use delivery_log::{DeliveryLog, DeliveryRecord, DeliveryStatus};
pub use error::{CoreError, CoreResult};
pub use mailer::{Mailer, DEFAULT_TEST_BODY, DEFAULT_TEST_SUBJECT};

/// Re-exports so hosts only need this crate
pub use m365mail_auth::{AuthError, Credentials};
pub use m365mail_graph::{
    Attachment, ContentType, DispatchFailure, DispatchResult, FailureKind, OutboundMessage,
    SkippedAttachment,
};
