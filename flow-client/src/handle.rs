//! Shared handle to the single application state.
//!
//! All mutation goes through [`StateHandle::dispatch`], which runs the
//! reducer and publishes the result to every subscriber.

use flowstate_core::{Action, AppState};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::trace;

/// Cloneable handle to the application state.
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<StateInner>,
}

struct StateInner {
    state: watch::Sender<AppState>,
    loading_depth: Mutex<usize>,
}

impl StateHandle {
    /// Create a handle holding `initial`.
    pub fn new(initial: AppState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(StateInner {
                state,
                loading_depth: Mutex::new(0),
            }),
        }
    }

    /// Apply one action.
    pub fn dispatch(&self, action: Action) {
        trace!(action = action.kind(), "dispatch");
        self.inner.state.send_modify(|state| {
            let current = std::mem::take(state);
            *state = current.reduce(action);
        });
    }

    /// Apply actions in order; subscribers see each step.
    pub fn dispatch_all<I>(&self, actions: I)
    where
        I: IntoIterator<Item = Action>,
    {
        for action in actions {
            self.dispatch(action);
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> AppState {
        self.inner.state.borrow().clone()
    }

    /// Last observed reachability.
    pub fn is_online(&self) -> bool {
        self.inner.state.borrow().is_online
    }

    /// Watch the state for changes.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.inner.state.subscribe()
    }

    /// Mark a tracked operation as in flight until the guard drops.
    ///
    /// Guards nest: `is_loading` stays set until the outermost one drops.
    pub fn loading(&self) -> LoadingGuard {
        let mut depth = self.depth();
        *depth += 1;
        if *depth == 1 {
            self.dispatch(Action::SetLoading(true));
        }
        LoadingGuard {
            handle: self.clone(),
        }
    }

    fn depth(&self) -> MutexGuard<'_, usize> {
        self.inner
            .loading_depth
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

impl std::fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateHandle")
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

/// Clears `is_loading` when the last outstanding guard drops.
///
/// Dropping covers every exit path: success, error and early return.
#[must_use = "loading is cleared as soon as the guard is dropped"]
pub struct LoadingGuard {
    handle: StateHandle,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let mut depth = self.handle.depth();
        *depth = depth.saturating_sub(1);
        if *depth == 0 {
            self.handle.dispatch(Action::SetLoading(false));
        }
    }
}
