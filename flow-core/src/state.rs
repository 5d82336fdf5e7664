//! Application state and its reducer.
//!
//! [`AppState`] is the single source of truth for session, onboarding and
//! feature state. It changes only through [`AppState::reduce`], a pure, total
//! function over [`Action`]: no I/O, no clock reads, no panics. Anything that
//! has to touch the outside world (persisting, calling the service) lives in
//! flow-client and dispatches actions here with the results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use flowstate_types::{Notification, RemoteAction, Timestamp, UserRecord};

/// Language code used until the user picks one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// The in-memory application state.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    /// Whether a user session is active.
    pub is_authenticated: bool,
    /// The signed-in user's profile.
    pub user: Option<UserRecord>,
    /// Whether onboarding has been finished.
    pub onboarding_completed: bool,
    /// Last observed reachability.
    pub is_online: bool,
    /// Whether a tracked operation is in flight.
    pub is_loading: bool,
    /// The single active user-facing message, if any.
    pub error: Option<String>,
    /// Notification feed, newest first.
    pub notifications: Vec<Notification>,
    /// Number of entries in `notifications` with `read == false`.
    pub unread_count: usize,
    /// Preferred language code.
    pub current_language: String,
    /// Interests chosen during onboarding.
    pub selected_interests: BTreeSet<String>,
    /// Whether this is a first-run user.
    pub is_new_user: bool,
    /// Whether the tutorial has been dismissed.
    pub has_seen_tutorial: bool,
    /// When the last sync completed ([`Timestamp::zero`] if never).
    pub last_sync_time: Timestamp,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            is_authenticated: false,
            user: None,
            onboarding_completed: false,
            is_online: true,
            is_loading: false,
            error: None,
            notifications: Vec::new(),
            unread_count: 0,
            current_language: DEFAULT_LANGUAGE.to_string(),
            selected_interests: BTreeSet::new(),
            is_new_user: true,
            has_seen_tutorial: false,
            last_sync_time: Timestamp::zero(),
        }
    }
}

impl AppState {
    /// Create the default state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one action and return the next state.
    ///
    /// Total over every [`Action`]; [`Action::Unknown`] returns the input
    /// unchanged.
    pub fn reduce(self, action: Action) -> Self {
        match action {
            Action::SetAuthenticated(is_authenticated) => Self {
                is_authenticated,
                ..self
            },
            Action::SetUser(user) => Self { user, ..self },
            Action::SetOnboardingCompleted(onboarding_completed) => Self {
                onboarding_completed,
                ..self
            },
            Action::SetOnlineStatus(is_online) => Self { is_online, ..self },
            Action::SetLoading(is_loading) => Self { is_loading, ..self },
            Action::SetError(error) => Self { error, ..self },
            Action::AddNotification(notification) => self.add_notification(notification),
            Action::MarkNotificationRead(id) => self.mark_notification_read(&id),
            Action::SetLanguage(current_language) => Self {
                current_language,
                ..self
            },
            Action::SetInterests(selected_interests) => Self {
                selected_interests,
                ..self
            },
            Action::SetNewUser(is_new_user) => Self {
                is_new_user,
                ..self
            },
            Action::SetTutorialSeen(has_seen_tutorial) => Self {
                has_seen_tutorial,
                ..self
            },
            Action::SetLastSync(last_sync_time) => Self {
                last_sync_time,
                ..self
            },
            Action::ResetState => Self::default(),
            Action::Unknown => self,
        }
    }

    /// Apply a sequence of actions in order.
    pub fn reduce_all<I>(self, actions: I) -> Self
    where
        I: IntoIterator<Item = Action>,
    {
        actions.into_iter().fold(self, Self::reduce)
    }

    /// Count of unread notifications, computed from the feed.
    pub fn unread_notifications(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    /// Whether a first-run user still needs the tutorial.
    pub fn should_show_tutorial(&self) -> bool {
        self.is_new_user && !self.has_seen_tutorial
    }

    fn add_notification(mut self, notification: Notification) -> Self {
        if !notification.read {
            self.unread_count += 1;
        }
        self.notifications.insert(0, notification);
        self
    }

    fn mark_notification_read(mut self, id: &str) -> Self {
        // Only the first unread match flips; a repeated mark is a no-op, so
        // the count cannot drift below the feed.
        if let Some(n) = self
            .notifications
            .iter_mut()
            .find(|n| n.id == id && !n.read)
        {
            n.read = true;
            self.unread_count = self.unread_count.saturating_sub(1);
        }
        self
    }
}

/// A discrete state transition.
///
/// Serialized as `{"type": "SET_USER", "payload": ...}`. Unrecognised type
/// tags deserialize to [`Action::Unknown`] instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Set whether a session is active.
    SetAuthenticated(bool),
    /// Replace (or clear) the user profile.
    SetUser(Option<UserRecord>),
    /// Set onboarding completion.
    SetOnboardingCompleted(bool),
    /// Record reachability.
    SetOnlineStatus(bool),
    /// Set the loading flag.
    SetLoading(bool),
    /// Replace (or clear) the active message.
    SetError(Option<String>),
    /// Prepend a notification.
    AddNotification(Notification),
    /// Mark the notification with this id as read.
    MarkNotificationRead(String),
    /// Set the preferred language.
    SetLanguage(String),
    /// Replace the interest set.
    SetInterests(BTreeSet<String>),
    /// Set the first-run flag.
    SetNewUser(bool),
    /// Set the tutorial-dismissed flag.
    SetTutorialSeen(bool),
    /// Record the last completed sync.
    SetLastSync(Timestamp),
    /// Return to the default state.
    ResetState,
    /// Any action kind this build does not know.
    #[serde(other)]
    Unknown,
}

impl Action {
    /// The action's type tag, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SetAuthenticated(_) => "SET_AUTHENTICATED",
            Action::SetUser(_) => "SET_USER",
            Action::SetOnboardingCompleted(_) => "SET_ONBOARDING_COMPLETED",
            Action::SetOnlineStatus(_) => "SET_ONLINE_STATUS",
            Action::SetLoading(_) => "SET_LOADING",
            Action::SetError(_) => "SET_ERROR",
            Action::AddNotification(_) => "ADD_NOTIFICATION",
            Action::MarkNotificationRead(_) => "MARK_NOTIFICATION_READ",
            Action::SetLanguage(_) => "SET_LANGUAGE",
            Action::SetInterests(_) => "SET_INTERESTS",
            Action::SetNewUser(_) => "SET_NEW_USER",
            Action::SetTutorialSeen(_) => "SET_TUTORIAL_SEEN",
            Action::SetLastSync(_) => "SET_LAST_SYNC",
            Action::ResetState => "RESET_STATE",
            Action::Unknown => "UNKNOWN",
        }
    }
}

/// The local state change implied by a remote action once it is applied.
///
/// `None` for actions whose effect is purely remote.
pub fn local_effect(action: &RemoteAction) -> Option<Action> {
    match action {
        RemoteAction::UpdateProfile { user } => Some(Action::SetUser(Some(user.clone()))),
        RemoteAction::SetInterests { interests } => Some(Action::SetInterests(interests.clone())),
        RemoteAction::SetLanguage { language } => Some(Action::SetLanguage(language.clone())),
        RemoteAction::MarkNotificationRead { notification_id } => {
            Some(Action::MarkNotificationRead(notification_id.clone()))
        }
        RemoteAction::Custom { .. } => None,
    }
}
