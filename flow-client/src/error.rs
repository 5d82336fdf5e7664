//! Error types for flow-client.

use flowstate_core::{Classify, ErrorKind, QueueError};
use flowstate_types::SnapshotError;

use crate::remote::RemoteError;

/// Main error type for controller internals.
///
/// Never escapes a public controller operation: each one routes it through
/// the classifier into the observable error state.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Persisted store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Remote service error.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Offline queue error.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Snapshot encode/decode error.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// An operation needed a session and there is none.
    #[error("no active session")]
    NoSession,
}

impl Classify for ClientError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            ClientError::Store(e) => e.error_kind(),
            ClientError::Remote(e) => e.error_kind(),
            ClientError::Queue(_) | ClientError::Snapshot(_) => ErrorKind::Unknown,
            ClientError::NoSession => ErrorKind::Auth,
        }
    }
}

/// Persisted store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store could not be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl Classify for StoreError {
    fn error_kind(&self) -> ErrorKind {
        // Store failures carry no typed kind; fall back to the text.
        ErrorKind::from_message(&self.to_string())
    }
}
