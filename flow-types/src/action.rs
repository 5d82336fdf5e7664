//! Replayable descriptions of work deferred while offline.
//!
//! A queued action has to survive a process restart and be replayed against
//! the remote service later, so it is plain data: a tagged variant with
//! explicit fields, never a closure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ids::{ActionId, Timestamp};
use crate::model::UserRecord;

/// An operation the remote service can apply.
///
/// Application of every variant must be idempotent on the service side: a
/// crash between "applied remotely" and "removed from the queue" re-delivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteAction {
    /// Replace the stored profile.
    UpdateProfile {
        /// The new profile.
        user: UserRecord,
    },
    /// Replace the selected interests.
    SetInterests {
        /// The full interest set.
        interests: BTreeSet<String>,
    },
    /// Change the preferred language.
    SetLanguage {
        /// Language code, e.g. `"en"`.
        language: String,
    },
    /// Mark a notification as read on the server.
    MarkNotificationRead {
        /// The notification to mark.
        notification_id: String,
    },
    /// An application-defined operation with a JSON body.
    Custom {
        /// Operation name understood by the service.
        name: String,
        /// Operation arguments.
        #[serde(default)]
        data: serde_json::Value,
    },
}

impl RemoteAction {
    /// Short name for logs.
    pub fn name(&self) -> &str {
        match self {
            Self::UpdateProfile { .. } => "update_profile",
            Self::SetInterests { .. } => "set_interests",
            Self::SetLanguage { .. } => "set_language",
            Self::MarkNotificationRead { .. } => "mark_notification_read",
            Self::Custom { name, .. } => name.as_str(),
        }
    }
}

/// A [`RemoteAction`] waiting in the offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Stable identity across restarts.
    pub id: ActionId,
    /// What to apply.
    pub payload: RemoteAction,
    /// When the action was queued.
    pub enqueued_at: Timestamp,
    /// Failed application attempts so far.
    #[serde(default)]
    pub attempts: u32,
}

impl QueuedAction {
    /// Wrap a payload with a fresh id and the current time.
    pub fn new(payload: RemoteAction) -> Self {
        Self::at(payload, Timestamp::now())
    }

    /// Wrap a payload with a fresh id and an explicit enqueue time.
    pub fn at(payload: RemoteAction, enqueued_at: Timestamp) -> Self {
        Self {
            id: ActionId::new(),
            payload,
            enqueued_at,
            attempts: 0,
        }
    }
}
