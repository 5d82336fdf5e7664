//! Application data carried in state and exchanged with the remote service.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::Timestamp;

/// The signed-in user's profile.
///
/// Known profile fields are typed; anything else the remote service sends
/// is preserved in `extra` so a round trip through the persisted snapshot
/// never drops data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserRecord {
    /// Remote identifier, absent until the service has assigned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Avatar image location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Free-form location string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Short biography.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Any fields not modelled above.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserRecord {
    /// A record carrying only a display name.
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }
}

/// An entry in the in-app notification feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Identifier used by mark-as-read.
    pub id: String,
    /// Headline.
    pub title: String,
    /// Body text.
    #[serde(default)]
    pub body: String,
    /// Whether the user has seen it.
    #[serde(default)]
    pub read: bool,
    /// When it was received.
    #[serde(default)]
    pub created_at: Timestamp,
}

impl Notification {
    /// Create an unread notification stamped with the current time.
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            body: String::new(),
            read: false,
            created_at: Timestamp::now(),
        }
    }
}

/// Sign-in credentials handed to the remote service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Create credentials from an email and password.
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// An authenticated session issued by the remote service.
#[derive(Clone, PartialEq)]
pub struct Session {
    /// Bearer token for service calls.
    pub access_token: String,
    /// Token used to obtain a fresh session.
    pub refresh_token: String,
    /// The user the session belongs to.
    pub user: UserRecord,
    /// When the access token stops being accepted.
    pub expires_at: Timestamp,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
