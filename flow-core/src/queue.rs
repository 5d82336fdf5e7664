//! Offline action queue for flowstate.
//!
//! This module provides the FIFO of actions attempted while offline with:
//! - FIFO ordering for replay (causal order of one user's actions)
//! - Per-item state: `Pending → Applying → {removed, Pending, dropped}`
//! - Retry-with-cap: an item is dropped after `max_attempts` failures
//! - Max size limits to prevent unbounded growth
//!
//! The queue is used by flow-client to drain deferred work. Items keep their
//! position while being applied, so a retried item stays ahead of everything
//! queued after it. An item that is `Applying` cannot be begun again, which
//! is what keeps two overlapping drains from applying it twice.

use std::collections::VecDeque;
use thiserror::Error;

use flowstate_types::{ActionId, QueuedAction};

/// Error type for queue operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Queue is at capacity.
    #[error("offline queue full (capacity: {capacity})")]
    Full {
        /// Current queue capacity.
        capacity: usize,
    },
}

/// What happened to an item after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Back to pending; will be attempted on the next drain.
    Retry {
        /// Failed attempts so far.
        attempts: u32,
    },
    /// Removed from the queue for good.
    Dropped {
        /// Failed attempts including this one.
        attempts: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemState {
    Pending,
    Applying,
}

#[derive(Debug, Clone)]
struct Entry {
    action: QueuedAction,
    state: ItemState,
}

/// Durable-work queue with in-flight tracking.
///
/// Items flow through the queue in this order:
/// 1. `enqueue()` - append as pending
/// 2. `begin()` - mark applying, hand out a copy
/// 3. `complete()` - remove (remote application confirmed)
///
/// If application fails, call `fail()`: the item goes back to pending in
/// place, or is dropped once terminal.
#[derive(Debug, Clone)]
pub struct ActionQueue {
    /// Maximum number of items (pending + applying).
    max_len: usize,
    /// Failed attempts after which an item is dropped.
    max_attempts: u32,
    entries: VecDeque<Entry>,
}

impl ActionQueue {
    /// Create an empty queue.
    ///
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_len: usize, max_attempts: u32) -> Self {
        Self {
            max_len,
            max_attempts: max_attempts.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Rebuild a queue from its persisted snapshot.
    ///
    /// Every item comes back as pending. Items are kept even beyond
    /// `max_len`: work that was already durable is never discarded here.
    pub fn restore(items: Vec<QueuedAction>, max_len: usize, max_attempts: u32) -> Self {
        let mut queue = Self::new(max_len, max_attempts);
        queue.entries = items
            .into_iter()
            .map(|action| Entry {
                action,
                state: ItemState::Pending,
            })
            .collect();
        queue
    }

    /// Append an action.
    ///
    /// Returns an error if the queue is full.
    pub fn enqueue(&mut self, action: QueuedAction) -> Result<(), QueueError> {
        if self.entries.len() >= self.max_len {
            return Err(QueueError::Full {
                capacity: self.max_len,
            });
        }
        self.entries.push_back(Entry {
            action,
            state: ItemState::Pending,
        });
        Ok(())
    }

    /// Ids of pending items, oldest first.
    pub fn pending_ids(&self) -> Vec<ActionId> {
        self.entries
            .iter()
            .filter(|e| e.state == ItemState::Pending)
            .map(|e| e.action.id)
            .collect()
    }

    /// Mark a pending item as applying and return a copy of it.
    ///
    /// Returns `None` if the item is gone or already being applied.
    pub fn begin(&mut self, id: &ActionId) -> Option<QueuedAction> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.action.id == *id && e.state == ItemState::Pending)?;
        entry.state = ItemState::Applying;
        Some(entry.action.clone())
    }

    /// Remove an applied item.
    pub fn complete(&mut self, id: &ActionId) -> Option<QueuedAction> {
        let index = self.position(id)?;
        self.entries.remove(index).map(|e| e.action)
    }

    /// Record a failed attempt.
    ///
    /// A `terminal` failure, or one that reaches `max_attempts`, drops the
    /// item; otherwise it returns to pending in its original position.
    /// Returns `None` for an unknown id.
    pub fn fail(&mut self, id: &ActionId, terminal: bool) -> Option<Disposition> {
        let index = self.position(id)?;
        let entry = &mut self.entries[index];
        entry.action.attempts = entry.action.attempts.saturating_add(1);
        let attempts = entry.action.attempts;

        if terminal || attempts >= self.max_attempts {
            self.entries.remove(index);
            Some(Disposition::Dropped { attempts })
        } else {
            entry.state = ItemState::Pending;
            Some(Disposition::Retry { attempts })
        }
    }

    /// Every item in order, for persistence.
    pub fn snapshot(&self) -> Vec<QueuedAction> {
        self.entries.iter().map(|e| e.action.clone()).collect()
    }

    /// Number of items (pending + applying).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, id: &ActionId) -> Option<usize> {
        self.entries.iter().position(|e| e.action.id == *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstate_types::{RemoteAction, Timestamp};

    fn make_action(language: &str) -> QueuedAction {
        QueuedAction::at(
            RemoteAction::SetLanguage {
                language: language.to_string(),
            },
            Timestamp::from_millis(1),
        )
    }

    fn language_of(action: &QueuedAction) -> &str {
        match &action.payload {
            RemoteAction::SetLanguage { language } => language.as_str(),
            _ => panic!("unexpected payload"),
        }
    }

    #[test]
    fn queue_appends_in_order() {
        let mut queue = ActionQueue::new(10, 3);
        let a = make_action("a");
        let b = make_action("b");
        let ids = vec![a.id, b.id];

        queue.enqueue(a).unwrap();
        queue.enqueue(b).unwrap();

        assert_eq!(queue.pending_ids(), ids);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn queue_respects_max_len() {
        let mut queue = ActionQueue::new(2, 3);

        queue.enqueue(make_action("a")).unwrap();
        queue.enqueue(make_action("b")).unwrap();
        let overflow = queue.enqueue(make_action("c"));

        assert_eq!(overflow, Err(QueueError::Full { capacity: 2 }));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn begin_marks_applying_once() {
        let mut queue = ActionQueue::new(10, 3);
        let action = make_action("a");
        let id = action.id;
        queue.enqueue(action).unwrap();

        assert!(queue.begin(&id).is_some());
        assert!(queue.begin(&id).is_none(), "second begin must not hand it out again");
        assert!(queue.pending_ids().is_empty());
    }

    #[test]
    fn complete_removes_item() {
        let mut queue = ActionQueue::new(10, 3);
        let action = make_action("a");
        let id = action.id;
        queue.enqueue(action).unwrap();

        queue.begin(&id);
        let done = queue.complete(&id).unwrap();

        assert_eq!(language_of(&done), "a");
        assert!(queue.is_empty());
        assert!(queue.complete(&id).is_none());
    }

    #[test]
    fn retryable_failure_keeps_position() {
        let mut queue = ActionQueue::new(10, 3);
        let first = make_action("first");
        let second = make_action("second");
        let first_id = first.id;
        queue.enqueue(first).unwrap();
        queue.enqueue(second).unwrap();

        queue.begin(&first_id);
        assert_eq!(
            queue.fail(&first_id, false),
            Some(Disposition::Retry { attempts: 1 })
        );

        let snapshot = queue.snapshot();
        assert_eq!(language_of(&snapshot[0]), "first");
        assert_eq!(snapshot[0].attempts, 1);
        assert_eq!(queue.pending_ids()[0], first_id);
    }

    #[test]
    fn terminal_failure_drops() {
        let mut queue = ActionQueue::new(10, 3);
        let action = make_action("bad");
        let id = action.id;
        queue.enqueue(action).unwrap();

        queue.begin(&id);
        assert_eq!(
            queue.fail(&id, true),
            Some(Disposition::Dropped { attempts: 1 })
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn retry_cap_drops_after_max_attempts() {
        let mut queue = ActionQueue::new(10, 2);
        let action = make_action("flaky");
        let id = action.id;
        queue.enqueue(action).unwrap();

        queue.begin(&id);
        assert_eq!(queue.fail(&id, false), Some(Disposition::Retry { attempts: 1 }));
        queue.begin(&id);
        assert_eq!(
            queue.fail(&id, false),
            Some(Disposition::Dropped { attempts: 2 })
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn restore_resets_applying_to_pending() {
        let mut original = make_action("a");
        original.attempts = 2;
        let id = original.id;

        let mut queue = ActionQueue::restore(vec![original], 10, 5);
        assert_eq!(queue.pending_ids(), vec![id]);
        assert_eq!(queue.begin(&id).unwrap().attempts, 2);
    }

    #[test]
    fn restore_keeps_items_beyond_capacity() {
        let items = vec![make_action("a"), make_action("b"), make_action("c")];
        let mut queue = ActionQueue::restore(items, 2, 3);

        assert_eq!(queue.len(), 3);
        assert!(queue.enqueue(make_action("d")).is_err());
    }

    #[test]
    fn snapshot_includes_applying_items() {
        let mut queue = ActionQueue::new(10, 3);
        let action = make_action("a");
        let id = action.id;
        queue.enqueue(action).unwrap();
        queue.begin(&id);

        assert_eq!(queue.snapshot().len(), 1);
        assert!(queue.pending_ids().is_empty());
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let mut queue = ActionQueue::new(10, 3);
        let fake = ActionId::new();

        assert!(queue.begin(&fake).is_none());
        assert!(queue.complete(&fake).is_none());
        assert!(queue.fail(&fake, false).is_none());
    }

    #[test]
    fn clear_removes_all() {
        let mut queue = ActionQueue::new(10, 3);
        queue.enqueue(make_action("a")).unwrap();
        queue.enqueue(make_action("b")).unwrap();

        queue.clear();

        assert!(queue.is_empty());
        assert!(queue.snapshot().is_empty());
    }

    #[test]
    fn zero_max_attempts_is_clamped() {
        let mut queue = ActionQueue::new(10, 0);
        let action = make_action("a");
        let id = action.id;
        queue.enqueue(action).unwrap();
        queue.begin(&id);

        assert_eq!(
            queue.fail(&id, false),
            Some(Disposition::Dropped { attempts: 1 })
        );
    }
}
