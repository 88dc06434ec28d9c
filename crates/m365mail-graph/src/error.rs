use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Attachment {} could not be read: {source}", .path.display())]
    AttachmentUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

pub type GraphResult<T> = Result<T, GraphError>;
