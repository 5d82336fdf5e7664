//! Remote service abstraction for flowstate.
//!
//! The backend that eventually receives deferred work. The controller only
//! needs three things from it:
//! - `apply_queued_action()` applies one replayed or immediate action
//! - `authenticate()` exchanges credentials for a session
//! - `refresh()` renews a session
//!
//! Failures carry a typed kind so the classifier does not have to guess from
//! text, except for [`RemoteError::Other`].

mod mock;

pub use mock::MockRemote;

use async_trait::async_trait;
use flowstate_core::{Classify, ErrorKind};
use flowstate_types::{Credentials, RemoteAction, Session};
use thiserror::Error;

/// Remote service errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Request never reached the service.
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("request timeout")]
    Timeout,

    /// Credentials or session rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Payload rejected by the service.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Opaque failure; classified by its text.
    #[error("{0}")]
    Other(String),
}

impl Classify for RemoteError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            RemoteError::Network(_) | RemoteError::Timeout => ErrorKind::Transient,
            RemoteError::Unauthorized(_) => ErrorKind::Auth,
            RemoteError::Validation(_) => ErrorKind::Validation,
            RemoteError::Other(message) => ErrorKind::from_message(message),
        }
    }
}

/// Remote service the controller replays work against.
///
/// Implementations handle the actual backend (HTTP API, mock, etc).
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Apply one action remotely.
    ///
    /// Must be safe to call again for an action whose earlier attempt
    /// failed: a failed attempt is retried on the next drain.
    async fn apply_queued_action(&self, action: &RemoteAction) -> Result<(), RemoteError>;

    /// Exchange credentials for a session.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, RemoteError>;

    /// Renew a session.
    async fn refresh(&self, session: &Session) -> Result<Session, RemoteError>;
}
