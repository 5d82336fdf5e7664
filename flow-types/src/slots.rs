//! Named slots of the persisted snapshot.
//!
//! Each slot is stored independently under a stable string key. Values are
//! JSON text, except [`Slot::CurrentLanguage`] which holds the bare code.
//! There is no multi-slot transaction; every slot tolerates being stale
//! relative to the others.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

use crate::error::SnapshotError;

/// A named slot in the persisted store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The signed-in user's profile (JSON object).
    User,
    /// Whether onboarding finished (JSON bool).
    OnboardingCompleted,
    /// Preferred language code (raw text).
    CurrentLanguage,
    /// Selected interests (JSON array of strings).
    SelectedInterests,
    /// Whether the tutorial was dismissed (JSON bool).
    HasSeenTutorial,
    /// Last completed sync, ms since epoch (JSON number).
    LastSyncTime,
    /// Deferred actions (JSON array of queued actions).
    OfflineQueue,
}

impl Slot {
    /// Every slot, in load order.
    pub const ALL: [Slot; 7] = [
        Slot::User,
        Slot::OnboardingCompleted,
        Slot::CurrentLanguage,
        Slot::SelectedInterests,
        Slot::HasSeenTutorial,
        Slot::LastSyncTime,
        Slot::OfflineQueue,
    ];

    /// The storage key.
    pub fn key(&self) -> &'static str {
        match self {
            Slot::User => "user",
            Slot::OnboardingCompleted => "onboardingCompleted",
            Slot::CurrentLanguage => "currentLanguage",
            Slot::SelectedInterests => "selectedInterests",
            Slot::HasSeenTutorial => "hasSeenTutorial",
            Slot::LastSyncTime => "lastSyncTime",
            Slot::OfflineQueue => "offlineQueue",
        }
    }

    /// Whether values in this slot are JSON-encoded.
    pub fn is_json(&self) -> bool {
        !matches!(self, Slot::CurrentLanguage)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Render a value as JSON text for `slot`.
pub fn encode_json<T: Serialize>(slot: Slot, value: &T) -> Result<String, SnapshotError> {
    serde_json::to_string(value).map_err(|source| SnapshotError::Encode { slot, source })
}

/// Parse JSON text stored in `slot`.
pub fn decode_json<T: DeserializeOwned>(slot: Slot, text: &str) -> Result<T, SnapshotError> {
    serde_json::from_str(text).map_err(|source| SnapshotError::Decode { slot, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashSet};

    #[test]
    fn keys_are_unique() {
        let keys: HashSet<&str> = Slot::ALL.iter().map(|s| s.key()).collect();
        assert_eq!(keys.len(), Slot::ALL.len());
    }

    #[test]
    fn keys_match_storage_layout() {
        assert_eq!(Slot::User.key(), "user");
        assert_eq!(Slot::OnboardingCompleted.key(), "onboardingCompleted");
        assert_eq!(Slot::OfflineQueue.key(), "offlineQueue");
    }

    #[test]
    fn only_language_is_raw() {
        let raw: Vec<Slot> = Slot::ALL.iter().copied().filter(|s| !s.is_json()).collect();
        assert_eq!(raw, vec![Slot::CurrentLanguage]);
    }

    #[test]
    fn bool_slot_text() {
        assert_eq!(encode_json(Slot::OnboardingCompleted, &true).unwrap(), "true");
        let done: bool = decode_json(Slot::OnboardingCompleted, "true").unwrap();
        assert!(done);
    }

    #[test]
    fn interests_decode_from_array() {
        let interests: BTreeSet<String> =
            decode_json(Slot::SelectedInterests, r#"["music","food","music"]"#).unwrap();
        assert_eq!(interests.len(), 2);
    }

    #[test]
    fn decode_failure_names_slot() {
        let err = decode_json::<bool>(Slot::HasSeenTutorial, "{").unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Decode {
                slot: Slot::HasSeenTutorial,
                ..
            }
        ));
    }
}
