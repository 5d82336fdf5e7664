//! Mock remote service for testing.
//!
//! Records applied actions and allows injecting failures and latency.

use super::{RemoteError, RemoteService};
use async_trait::async_trait;
use flowstate_types::{Credentials, RemoteAction, Session, Timestamp, UserRecord};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const SESSION_TTL_MS: u64 = 60 * 60 * 1000;

/// Mock remote service for testing.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the controller owns another.
#[derive(Debug, Default, Clone)]
pub struct MockRemote {
    inner: Arc<Mutex<MockRemoteInner>>,
}

#[derive(Debug, Default)]
struct MockRemoteInner {
    applied: Vec<RemoteAction>,
    apply_calls: usize,
    apply_failures: VecDeque<RemoteError>,
    persistent_failure: Option<RemoteError>,
    accounts: HashMap<String, (String, UserRecord)>,
    refresh_failure: Option<RemoteError>,
    issued: u64,
    latency: Option<Duration>,
}

impl MockRemote {
    /// Create a new mock remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before it takes effect.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = Some(latency);
        self
    }

    /// Register an account that `authenticate()` will accept.
    pub fn add_account(&self, email: &str, password: &str, user: UserRecord) {
        self.lock()
            .accounts
            .insert(email.to_string(), (password.to_string(), user));
    }

    /// Actions applied successfully, in order.
    pub fn applied(&self) -> Vec<RemoteAction> {
        self.lock().applied.clone()
    }

    /// Number of `apply_queued_action()` calls, failed ones included.
    pub fn apply_calls(&self) -> usize {
        self.lock().apply_calls
    }

    /// Cause the next apply to fail. Calls stack up in order.
    pub fn fail_next_apply(&self, error: RemoteError) {
        self.lock().apply_failures.push_back(error);
    }

    /// Fail every apply with `error` until cleared with `None`.
    pub fn fail_always(&self, error: Option<RemoteError>) {
        self.lock().persistent_failure = error;
    }

    /// Cause the next refresh to fail.
    pub fn fail_next_refresh(&self, error: RemoteError) {
        self.lock().refresh_failure = Some(error);
    }

    fn lock(&self) -> MutexGuard<'_, MockRemoteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl MockRemoteInner {
    fn issue(&mut self, user: UserRecord) -> Session {
        self.issued += 1;
        Session {
            access_token: format!("access-{}", self.issued),
            refresh_token: format!("refresh-{}", self.issued),
            user,
            expires_at: Timestamp::from_millis(Timestamp::now().as_millis() + SESSION_TTL_MS),
        }
    }
}

#[async_trait]
impl RemoteService for MockRemote {
    async fn apply_queued_action(&self, action: &RemoteAction) -> Result<(), RemoteError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.apply_calls += 1;

        if let Some(error) = inner.apply_failures.pop_front() {
            return Err(error);
        }
        if let Some(error) = inner.persistent_failure.clone() {
            return Err(error);
        }

        inner.applied.push(action.clone());
        Ok(())
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, RemoteError> {
        self.delay().await;
        let mut inner = self.lock();

        let user = match inner.accounts.get(&credentials.email) {
            Some((password, user)) if *password == credentials.password => user.clone(),
            _ => return Err(RemoteError::Unauthorized("invalid credentials".into())),
        };
        Ok(inner.issue(user))
    }

    async fn refresh(&self, session: &Session) -> Result<Session, RemoteError> {
        self.delay().await;
        let mut inner = self.lock();

        if let Some(error) = inner.refresh_failure.take() {
            return Err(error);
        }
        Ok(inner.issue(session.user.clone()))
    }
}
