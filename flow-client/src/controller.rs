//! Sync controller for flowstate.
//!
//! The controller is the only component that touches the outside world. It
//! loads and persists the snapshot slots, defers work while offline, drains
//! the offline queue through the remote service and reports every failure
//! into the state through the classifier.
//!
//! # Failure handling
//!
//! No public operation returns an error. Failures are classified, logged
//! and dispatched as an error message (plus any forced side effect); the
//! return value only tells the caller what happened.
//!
//! # Concurrency
//!
//! At most one drain runs at a time. `sync_data()` callers that overlap a
//! running drain wait on the gate and then drain whatever is still pending,
//! so a queued action is never applied twice by overlapping syncs. An
//! action submitted while online takes the same gate and goes behind any
//! older queued work.
//!
//! # Queue durability
//!
//! The in-memory queue is restored from its slot before anything reads or
//! writes it, whether or not `load_persisted_state()` has run yet.

use std::collections::BTreeSet;
use std::sync::PoisonError;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use flowstate_core::{
    local_effect, Action, ActionQueue, AppState, Classification, Classify, Disposition, ErrorKind,
    QUEUED_MESSAGE,
};
use flowstate_types::{
    decode_json, encode_json, Credentials, Notification, QueuedAction, RemoteAction, Session,
    Slot, Timestamp, UserRecord,
};

use crate::config::{ClientConfig, QueueSettings};
use crate::error::ClientError;
use crate::handle::StateHandle;
use crate::remote::RemoteService;
use crate::store::PersistedStore;

/// What one drain pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Actions applied remotely and removed.
    pub applied: usize,
    /// Failed actions kept for a later pass.
    pub retried: usize,
    /// Failed actions removed for good.
    pub dropped: usize,
    /// Actions still queued after the pass.
    pub remaining: usize,
    /// Set when the pass stopped before reaching the end of the queue.
    pub interrupted: Option<ErrorKind>,
}

impl DrainReport {
    /// Whether the pass visited every pending action.
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

/// Result of `sync_data()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Not online; nothing was attempted.
    Offline,
    /// The queue was drained (possibly partially, see
    /// [`DrainReport::interrupted`]).
    Synced(DrainReport),
    /// The drain finished but the sync time could not be recorded.
    Failed(ErrorKind),
}

/// Result of `handle_offline_action()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Applied remotely right away.
    Applied,
    /// Deferred to the offline queue.
    Queued,
    /// Neither applied nor queued.
    Failed(ErrorKind),
}

const LOAD: &str = "loadPersistedState";
const ONBOARDING: &str = "completeOnboarding";
const SYNC: &str = "syncData";
const OFFLINE_ACTION: &str = "handleOfflineAction";

/// The offline queue and whether it has been read back from its slot.
struct QueueState {
    items: ActionQueue,
    loaded: bool,
}

impl QueueState {
    fn new(settings: &QueueSettings) -> Self {
        Self {
            items: ActionQueue::new(settings.max_len, settings.max_attempts),
            loaded: false,
        }
    }

    /// Replace the items with the persisted queue text.
    fn restore(&mut self, settings: &QueueSettings, raw: Option<String>) -> usize {
        let items = decode_slot::<Vec<QueuedAction>>(Slot::OfflineQueue, raw).unwrap_or_default();
        let restored = items.len();
        self.items = ActionQueue::restore(items, settings.max_len, settings.max_attempts);
        self.loaded = true;
        restored
    }
}

/// Offline-first state store and sync controller.
pub struct SyncController<S, R> {
    config: ClientConfig,
    store: S,
    remote: R,
    state: StateHandle,
    queue: Mutex<QueueState>,
    /// Held for the whole of a drain.
    sync_gate: Mutex<()>,
    session: Mutex<Option<Session>>,
    /// Last reachability reported; `None` until the first report.
    reachability: std::sync::Mutex<Option<bool>>,
}

impl<S: PersistedStore, R: RemoteService> SyncController<S, R> {
    /// Create a controller with default state and an empty queue.
    pub fn new(config: ClientConfig, store: S, remote: R) -> Self {
        let queue = QueueState::new(&config.queue);
        Self {
            config,
            store,
            remote,
            state: StateHandle::default(),
            queue: Mutex::new(queue),
            sync_gate: Mutex::new(()),
            session: Mutex::new(None),
            reachability: std::sync::Mutex::new(None),
        }
    }

    // ===========================================
    // Startup
    // ===========================================

    /// Read every persisted slot and fold the present ones into the state.
    ///
    /// Absent slots keep their defaults. A slot that fails to decode is
    /// skipped. If the store itself fails, nothing is applied, the failure
    /// is reported and `false` is returned.
    pub async fn load_persisted_state(&self) -> bool {
        let _loading = self.state.loading();

        let read = tokio::try_join!(
            self.store.get(Slot::User.key()),
            self.store.get(Slot::OnboardingCompleted.key()),
            self.store.get(Slot::CurrentLanguage.key()),
            self.store.get(Slot::SelectedInterests.key()),
            self.store.get(Slot::HasSeenTutorial.key()),
            self.store.get(Slot::LastSyncTime.key()),
            self.store.get(Slot::OfflineQueue.key()),
        );
        let (user, onboarding, language, interests, tutorial, last_sync, queued) = match read {
            Ok(slots) => slots,
            Err(e) => {
                self.report(e, LOAD);
                return false;
            }
        };

        if let Some(user) = decode_slot::<UserRecord>(Slot::User, user) {
            self.state.dispatch(Action::SetUser(Some(user)));
            self.state.dispatch(Action::SetAuthenticated(true));
        }
        if let Some(done) = decode_slot::<bool>(Slot::OnboardingCompleted, onboarding) {
            self.state.dispatch(Action::SetOnboardingCompleted(done));
        }
        if let Some(language) = language.filter(|l| !l.is_empty()) {
            self.state.dispatch(Action::SetLanguage(language));
        }
        if let Some(interests) = decode_slot::<BTreeSet<String>>(Slot::SelectedInterests, interests)
        {
            self.state.dispatch(Action::SetInterests(interests));
        }
        if let Some(seen) = decode_slot::<bool>(Slot::HasSeenTutorial, tutorial) {
            self.state.dispatch(Action::SetTutorialSeen(seen));
        }
        if let Some(at) = decode_slot::<Timestamp>(Slot::LastSyncTime, last_sync) {
            self.state.dispatch(Action::SetLastSync(at));
        }

        // An action queued before this load already pulled the slot in.
        let mut queue = self.queue.lock().await;
        if !queue.loaded {
            queue.restore(&self.config.queue, queued);
        }
        let depth = queue.items.len();
        drop(queue);

        info!(queued = depth, "Persisted state loaded");
        true
    }

    // ===========================================
    // Onboarding and preferences
    // ===========================================

    /// Finish onboarding for `user`.
    ///
    /// The user record and the completion flag are written before the
    /// in-memory state changes. When online a sync follows; its failure is
    /// reported but does not undo the onboarding. Returns `false` only if
    /// persisting failed, in which case the state is left untouched.
    pub async fn complete_onboarding(&self, user: UserRecord) -> bool {
        let _loading = self.state.loading();

        let persisted = async {
            self.persist_json(Slot::User, &user).await?;
            self.persist_json(Slot::OnboardingCompleted, &true).await
        };
        if let Err(e) = persisted.await {
            self.report(e, ONBOARDING);
            return false;
        }

        self.state.dispatch_all([
            Action::SetUser(Some(user)),
            Action::SetAuthenticated(true),
            Action::SetOnboardingCompleted(true),
            Action::SetNewUser(false),
        ]);

        if self.state.is_online() {
            let outcome = self.sync_data().await;
            debug!(?outcome, "Post-onboarding sync");
        }
        true
    }

    /// Record that the tutorial was dismissed.
    pub async fn mark_tutorial_seen(&self) -> bool {
        if let Err(e) = self.persist_json(Slot::HasSeenTutorial, &true).await {
            self.report(e, "markTutorialSeen");
            return false;
        }
        self.state.dispatch(Action::SetTutorialSeen(true));
        true
    }

    /// Whether a first-run user still needs the tutorial.
    pub fn should_show_tutorial(&self) -> bool {
        self.state.snapshot().should_show_tutorial()
    }

    /// Persist and apply a language choice.
    pub async fn set_language(&self, code: &str) -> bool {
        if let Err(e) = self.store.set(Slot::CurrentLanguage.key(), code).await {
            self.report(e, "setLanguage");
            return false;
        }
        self.state.dispatch(Action::SetLanguage(code.to_string()));
        true
    }

    /// Persist and apply the selected interests.
    pub async fn set_interests(&self, interests: BTreeSet<String>) -> bool {
        if let Err(e) = self.persist_json(Slot::SelectedInterests, &interests).await {
            self.report(e, "setInterests");
            return false;
        }
        self.state.dispatch(Action::SetInterests(interests));
        true
    }

    /// Prepend a notification to the feed.
    pub fn add_notification(&self, notification: Notification) {
        self.state.dispatch(Action::AddNotification(notification));
    }

    /// Mark a notification as read.
    pub fn mark_notification_read(&self, id: &str) {
        self.state.dispatch(Action::MarkNotificationRead(id.to_string()));
    }

    /// Reset the user-facing message.
    pub fn clear_error(&self) {
        self.state.dispatch(Action::SetError(None));
    }

    // ===========================================
    // Sync
    // ===========================================

    /// Drain the offline queue and record the sync time.
    ///
    /// No-op while offline. The sync time only advances when the drain
    /// reached the end of the queue.
    pub async fn sync_data(&self) -> SyncOutcome {
        if !self.state.is_online() {
            debug!("Sync skipped: offline");
            return SyncOutcome::Offline;
        }

        let _flight = self.sync_gate.lock().await;
        self.sync_locked().await
    }

    /// The body of `sync_data()`; callers hold the sync gate.
    async fn sync_locked(&self) -> SyncOutcome {
        // Connectivity may have dropped while waiting on the gate.
        if !self.state.is_online() {
            debug!("Sync skipped: offline");
            return SyncOutcome::Offline;
        }

        let _loading = self.state.loading();
        let report = self.drain().await;

        if let Some(kind) = report.interrupted {
            info!(?kind, remaining = report.remaining, "Sync interrupted");
            return SyncOutcome::Synced(report);
        }

        let now = Timestamp::now();
        if let Err(e) = self.persist_json(Slot::LastSyncTime, &now).await {
            return SyncOutcome::Failed(self.report(e, SYNC));
        }
        self.state.dispatch(Action::SetLastSync(now));

        info!(
            applied = report.applied,
            dropped = report.dropped,
            remaining = report.remaining,
            "Sync complete"
        );
        SyncOutcome::Synced(report)
    }

    /// Run `action` now if online, otherwise defer it.
    ///
    /// Deferring sets an informational message rather than failing. When
    /// online, older queued actions are drained first; if any of them is
    /// still pending afterwards, `action` is queued behind it.
    pub async fn handle_offline_action(&self, action: RemoteAction) -> ActionOutcome {
        if !self.state.is_online() {
            return match self.enqueue(action).await {
                Ok(()) => {
                    self.state
                        .dispatch(Action::SetError(Some(QUEUED_MESSAGE.to_string())));
                    ActionOutcome::Queued
                }
                Err(e) => ActionOutcome::Failed(self.report(e, OFFLINE_ACTION)),
            };
        }

        let _loading = self.state.loading();
        let _flight = self.sync_gate.lock().await;

        let backlog = match self.loaded_queue().await {
            Ok(queue) => !queue.items.is_empty(),
            Err(e) => return ActionOutcome::Failed(self.report(e, OFFLINE_ACTION)),
        };
        if backlog {
            let outcome = self.sync_locked().await;
            debug!(?outcome, "Backlog drained ahead of online action");

            let stuck = !self.queue.lock().await.items.is_empty();
            if stuck {
                // The drain already reported why the backlog is stuck.
                return match self.enqueue(action).await {
                    Ok(()) => ActionOutcome::Queued,
                    Err(e) => ActionOutcome::Failed(self.report(e, OFFLINE_ACTION)),
                };
            }
        }

        match self.remote.apply_queued_action(&action).await {
            Ok(()) => {
                self.fold_local_effect(&action, OFFLINE_ACTION).await;
                ActionOutcome::Applied
            }
            Err(e) => ActionOutcome::Failed(self.report(e, OFFLINE_ACTION)),
        }
    }

    /// Record a reachability change.
    ///
    /// `None` counts as unreachable. An online report starts a sync when
    /// the last report was offline or there was none yet; its outcome is
    /// returned.
    pub async fn on_connectivity_change(&self, reachable: Option<bool>) -> Option<SyncOutcome> {
        let online = reachable.unwrap_or(false);
        let previous = {
            let mut observed = self
                .reachability
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let previous = observed.replace(online);
            self.state.dispatch(Action::SetOnlineStatus(online));
            previous
        };

        if previous == Some(online) {
            return None;
        }
        info!(online, ?previous, "Connectivity changed");

        if online {
            Some(self.sync_data().await)
        } else {
            None
        }
    }

    // ===========================================
    // Session
    // ===========================================

    /// Authenticate and adopt the returned session.
    pub async fn sign_in(&self, credentials: &Credentials) -> bool {
        let _loading = self.state.loading();

        let session = match self.remote.authenticate(credentials).await {
            Ok(session) => session,
            Err(e) => {
                self.report(e, "signIn");
                return false;
            }
        };
        if let Err(e) = self.persist_json(Slot::User, &session.user).await {
            self.report(e, "signIn");
            return false;
        }

        let user = session.user.clone();
        *self.session.lock().await = Some(session);
        self.state.dispatch_all([
            Action::SetUser(Some(user)),
            Action::SetAuthenticated(true),
        ]);
        true
    }

    /// Renew the current session.
    ///
    /// A rejected refresh, or having no session at all, signs the user out
    /// through the auth failure path.
    pub async fn refresh_session(&self) -> bool {
        let mut session = self.session.lock().await;
        let Some(current) = session.as_ref() else {
            drop(session);
            self.report(ClientError::NoSession, "refreshSession");
            return false;
        };

        let refreshed = self.remote.refresh(current).await;
        match refreshed {
            Ok(renewed) => {
                let user = renewed.user.clone();
                *session = Some(renewed);
                drop(session);
                self.state.dispatch(Action::SetUser(Some(user)));
                true
            }
            Err(e) => {
                if e.error_kind() == ErrorKind::Auth {
                    *session = None;
                }
                drop(session);
                self.report(e, "refreshSession");
                false
            }
        }
    }

    /// Forget the user: every slot, the queue, the session and the state.
    ///
    /// Connectivity is observed rather than user state, so it survives the
    /// reset. Returns `false` if some slot could not be deleted; the
    /// in-memory state is reset regardless.
    pub async fn sign_out(&self) -> bool {
        let _flight = self.sync_gate.lock().await;
        let online = self.state.is_online();

        let mut failure = None;
        for slot in Slot::ALL {
            if let Err(e) = self.store.delete(slot.key()).await {
                failure.get_or_insert(e);
            }
        }
        let mut queue = self.queue.lock().await;
        queue.items.clear();
        // The slot is gone too, so there is nothing left to restore.
        queue.loaded = true;
        drop(queue);
        *self.session.lock().await = None;

        self.state.dispatch_all([Action::ResetState, Action::SetOnlineStatus(online)]);
        info!("Signed out");

        match failure {
            Some(e) => {
                self.report(e, "signOut");
                false
            }
            None => true,
        }
    }

    // ===========================================
    // Accessors
    // ===========================================

    /// A copy of the current state.
    pub fn state(&self) -> AppState {
        self.state.snapshot()
    }

    /// Watch the state for changes.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    /// The shared state handle.
    pub fn handle(&self) -> &StateHandle {
        &self.state
    }

    /// The deferred actions, oldest first.
    pub async fn queued_actions(&self) -> Vec<QueuedAction> {
        match self.loaded_queue().await {
            Ok(queue) => queue.items.snapshot(),
            Err(e) => {
                self.report(e, "queuedActions");
                Vec::new()
            }
        }
    }

    /// The persisted store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The remote service.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    // ===========================================
    // Internals
    // ===========================================

    /// One pass over the pending actions, oldest first.
    ///
    /// Each applied action has its local effect folded in and is removed
    /// durably before the next one is attempted.
    async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        let pending = match self.loaded_queue().await {
            Ok(queue) => queue.items.pending_ids(),
            Err(e) => {
                report.interrupted = Some(self.report(e, SYNC));
                Vec::new()
            }
        };

        for id in pending {
            let Some(item) = self.queue.lock().await.items.begin(&id) else {
                continue;
            };

            match self.remote.apply_queued_action(&item.payload).await {
                Ok(()) => {
                    debug!(%id, action = item.payload.name(), "Queued action applied");
                    self.fold_local_effect(&item.payload, SYNC).await;
                    report.applied += 1;

                    let mut queue = self.queue.lock().await;
                    queue.items.complete(&id);
                    if let Err(e) = self.write_queue(&queue.items).await {
                        drop(queue);
                        report.interrupted = Some(self.report(e, SYNC));
                        break;
                    }
                }
                Err(error) => {
                    let kind = error.error_kind();
                    let mut queue = self.queue.lock().await;

                    match queue.items.fail(&id, kind == ErrorKind::Validation) {
                        Some(Disposition::Dropped { attempts }) => {
                            warn!(%id, attempts, ?kind, "Queued action dropped");
                            report.dropped += 1;
                        }
                        Some(Disposition::Retry { attempts }) => {
                            debug!(%id, attempts, ?kind, "Queued action kept for retry");
                            report.retried += 1;
                        }
                        None => {}
                    }
                    let persisted = self.write_queue(&queue.items).await;
                    drop(queue);

                    self.report(error, SYNC);
                    if let Err(e) = persisted {
                        report.interrupted = Some(self.report(e, SYNC));
                        break;
                    }
                    if matches!(kind, ErrorKind::Transient | ErrorKind::Auth) {
                        report.interrupted = Some(kind);
                        break;
                    }
                }
            }
        }

        report.remaining = self.queue.lock().await.items.len();
        report
    }

    /// Lock the queue, first reading it back from its slot if that has not
    /// happened yet.
    ///
    /// Nothing writes the slot before this succeeds, so a write never
    /// replaces actions persisted by an earlier run.
    async fn loaded_queue(&self) -> Result<MutexGuard<'_, QueueState>, ClientError> {
        let mut queue = self.queue.lock().await;
        if !queue.loaded {
            let raw = self.store.get(Slot::OfflineQueue.key()).await?;
            let restored = queue.restore(&self.config.queue, raw);
            debug!(restored, "Offline queue read back");
        }
        Ok(queue)
    }

    /// Append to the queue and persist it; nothing is kept if the write
    /// fails.
    async fn enqueue(&self, action: RemoteAction) -> Result<(), ClientError> {
        let item = QueuedAction::new(action);
        let id = item.id;
        let mut queue = self.loaded_queue().await?;

        queue.items.enqueue(item)?;
        if let Err(e) = self.write_queue(&queue.items).await {
            queue.items.complete(&id);
            return Err(e);
        }

        info!(%id, depth = queue.items.len(), "Action queued");
        Ok(())
    }

    /// Dispatch the state change an applied action implies and persist the
    /// slot it touches.
    async fn fold_local_effect(&self, action: &RemoteAction, context: &str) {
        let Some(effect) = local_effect(action) else {
            return;
        };

        let persisted = match &effect {
            Action::SetUser(Some(user)) => self.persist_json(Slot::User, user).await,
            Action::SetInterests(interests) => {
                self.persist_json(Slot::SelectedInterests, interests).await
            }
            Action::SetLanguage(code) => self
                .store
                .set(Slot::CurrentLanguage.key(), code)
                .await
                .map_err(ClientError::from),
            _ => Ok(()),
        };

        self.state.dispatch(effect);
        if let Err(e) = persisted {
            self.report(e, context);
        }
    }

    /// Write the queue slot; an empty queue removes it.
    ///
    /// Callers hold the queue lock, so writes land in queue order.
    async fn write_queue(&self, queue: &ActionQueue) -> Result<(), ClientError> {
        if queue.is_empty() {
            self.store.delete(Slot::OfflineQueue.key()).await?;
        } else {
            self.persist_json(Slot::OfflineQueue, &queue.snapshot()).await?;
        }
        Ok(())
    }

    async fn persist_json<T: Serialize>(&self, slot: Slot, value: &T) -> Result<(), ClientError> {
        let text = encode_json(slot, value)?;
        self.store.set(slot.key(), &text).await?;
        Ok(())
    }

    /// Classify a failure, log it and dispatch the resulting actions.
    fn report<E: Into<ClientError>>(&self, error: E, context: &str) -> ErrorKind {
        let error = error.into();
        let classification = Classification::of(&error, context);
        warn!(context, kind = ?classification.kind, "{}", error);
        self.state.dispatch_all(classification.actions());
        classification.kind
    }
}

/// Decode one JSON slot, treating unreadable text as absent.
fn decode_slot<T: DeserializeOwned>(slot: Slot, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match decode_json(slot, &raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(%slot, "Skipping unreadable slot: {}", e);
            None
        }
    }
}

impl<S, R> std::fmt::Debug for SyncController<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
