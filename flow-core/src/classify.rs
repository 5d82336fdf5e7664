//! Error taxonomy and user-facing classification.
//!
//! Every failure that reaches a public operation is reduced to an
//! [`ErrorKind`], which fixes the message shown to the user and any forced
//! state change (an auth failure signs the user out).
//!
//! Collaborators that know what went wrong report it through [`Classify`].
//! Opaque failures fall back to [`ErrorKind::from_message`], a substring
//! heuristic over the failure text.

use crate::state::Action;

/// Informational message set when an action is deferred while offline.
pub const QUEUED_MESSAGE: &str = "Action queued for when you're back online";

const TRANSIENT_MARKERS: &[&str] = &["network", "connection", "timeout", "unreachable", "offline"];
const AUTH_MARKERS: &[&str] = &["unauthorized", "permission", "forbidden"];
const VALIDATION_MARKERS: &[&str] = &["validation", "invalid"];

/// Failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connectivity problem; retried on the next online transition.
    Transient,
    /// Credentials rejected; forces the signed-out state.
    Auth,
    /// Caller input was rejected.
    Validation,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Classify free-form failure text.
    ///
    /// Case-insensitive. Checked in table order: network, then
    /// authorization, then validation.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        let contains_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

        if contains_any(TRANSIENT_MARKERS) {
            ErrorKind::Transient
        } else if contains_any(AUTH_MARKERS) {
            ErrorKind::Auth
        } else if contains_any(VALIDATION_MARKERS) {
            ErrorKind::Validation
        } else {
            ErrorKind::Unknown
        }
    }

    /// The message shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "Network error. Please check your connection.",
            ErrorKind::Auth => "Please sign in again.",
            ErrorKind::Validation => "Please check your input and try again.",
            ErrorKind::Unknown => "An unexpected error occurred",
        }
    }

    /// State changes forced by this kind, beyond the message.
    pub fn side_effects(&self) -> Vec<Action> {
        match self {
            ErrorKind::Auth => vec![Action::SetAuthenticated(false)],
            _ => Vec::new(),
        }
    }

    /// Whether the failure is worth retrying later.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorKind::Validation)
    }
}

/// Errors that can name their own [`ErrorKind`].
pub trait Classify {
    /// The taxonomy bucket for this failure.
    fn error_kind(&self) -> ErrorKind;
}

/// The outcome of classifying one failure in one calling context.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Taxonomy bucket.
    pub kind: ErrorKind,
    /// Name of the operation that failed.
    pub context: String,
}

impl Classification {
    /// Classify a failure raised inside `context`.
    pub fn of<E: Classify + ?Sized>(error: &E, context: &str) -> Self {
        Self::new(error.error_kind(), context)
    }

    /// Wrap an already-known kind.
    pub fn new(kind: ErrorKind, context: &str) -> Self {
        Self {
            kind,
            context: context.to_string(),
        }
    }

    /// The message shown to the user.
    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }

    /// Every action to dispatch: forced side effects, then the message.
    pub fn actions(&self) -> Vec<Action> {
        let mut actions = self.kind.side_effects();
        actions.push(Action::SetError(Some(self.user_message().to_string())));
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    struct Opaque(&'static str);

    impl Classify for Opaque {
        fn error_kind(&self) -> ErrorKind {
            ErrorKind::from_message(self.0)
        }
    }

    #[test]
    fn network_text_is_transient() {
        assert_eq!(
            ErrorKind::from_message("network request failed"),
            ErrorKind::Transient
        );
        assert_eq!(ErrorKind::from_message("Connection reset"), ErrorKind::Transient);
    }

    #[test]
    fn unauthorized_text_is_auth() {
        assert_eq!(ErrorKind::from_message("401 Unauthorized"), ErrorKind::Auth);
        assert_eq!(
            ErrorKind::from_message("permission denied for table profiles"),
            ErrorKind::Auth
        );
    }

    #[test]
    fn validation_text_is_validation() {
        assert_eq!(
            ErrorKind::from_message("validation failed: email"),
            ErrorKind::Validation
        );
    }

    #[test]
    fn network_wins_over_auth() {
        assert_eq!(
            ErrorKind::from_message("network error while checking permission"),
            ErrorKind::Transient
        );
    }

    #[test]
    fn anything_else_is_unknown() {
        assert_eq!(ErrorKind::from_message("disk on fire"), ErrorKind::Unknown);
        assert_eq!(ErrorKind::from_message(""), ErrorKind::Unknown);
    }

    #[test]
    fn messages_match_policy_table() {
        assert_eq!(
            ErrorKind::Transient.user_message(),
            "Network error. Please check your connection."
        );
        assert_eq!(ErrorKind::Auth.user_message(), "Please sign in again.");
        assert_eq!(
            ErrorKind::Validation.user_message(),
            "Please check your input and try again."
        );
        assert_eq!(ErrorKind::Unknown.user_message(), "An unexpected error occurred");
    }

    #[test]
    fn auth_classification_signs_out() {
        let signed_in = AppState::new().reduce(Action::SetAuthenticated(true));
        let classification = Classification::of(&Opaque("unauthorized"), "syncData");

        let state = signed_in.reduce_all(classification.actions());

        assert!(!state.is_authenticated);
        assert_eq!(state.error.as_deref(), Some("Please sign in again."));
        assert_eq!(classification.context, "syncData");
    }

    #[test]
    fn non_auth_classification_only_sets_message() {
        let before = AppState::new().reduce(Action::SetAuthenticated(true));
        let after = before
            .clone()
            .reduce_all(Classification::new(ErrorKind::Transient, "x").actions());

        assert!(after.is_authenticated);
        assert_eq!(
            after,
            AppState {
                error: Some(ErrorKind::Transient.user_message().to_string()),
                ..before
            }
        );
    }

    #[test]
    fn only_validation_is_not_retryable() {
        assert!(ErrorKind::Transient.is_retryable());
        assert!(ErrorKind::Auth.is_retryable());
        assert!(ErrorKind::Unknown.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
    }
}
