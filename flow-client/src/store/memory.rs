//! In-memory store for testing.
//!
//! Allows seeding values, inspecting writes and injecting failures.

use super::PersistedStore;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory store.
///
/// Clones share state, so a test can keep one clone for assertions after
/// handing another to the controller.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    values: HashMap<String, String>,
    fail_next_get: Option<String>,
    fail_next_set: Option<String>,
    fail_next_delete: Option<String>,
    unavailable: Option<String>,
    writes: usize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given pairs.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        {
            let mut inner = store.lock();
            inner.values = values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect();
        }
        store
    }

    /// Current value of a key.
    pub fn value(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    /// Copy of every stored pair.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.lock().values.clone()
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Cause the next get() to fail with the given error.
    pub fn fail_next_get(&self, error: &str) {
        self.lock().fail_next_get = Some(error.to_string());
    }

    /// Cause the next set() to fail with the given error.
    pub fn fail_next_set(&self, error: &str) {
        self.lock().fail_next_set = Some(error.to_string());
    }

    /// Cause the next delete() to fail with the given error.
    pub fn fail_next_delete(&self, error: &str) {
        self.lock().fail_next_delete = Some(error.to_string());
    }

    /// Make every operation fail until called again with `None`.
    pub fn set_unavailable(&self, error: Option<&str>) {
        self.lock().unavailable = error.map(str::to_string);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryStoreInner {
    fn check(&mut self, one_shot: fn(&mut Self) -> &mut Option<String>) -> Result<(), StoreError> {
        if let Some(error) = &self.unavailable {
            return Err(StoreError::Unavailable(error.clone()));
        }
        match one_shot(self).take() {
            Some(error) => Err(StoreError::Unavailable(error)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PersistedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.lock();
        inner.check(|i| &mut i.fail_next_get)?;
        Ok(inner.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check(|i| &mut i.fail_next_set)?;
        inner.values.insert(key.to_string(), value.to_string());
        inner.writes += 1;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check(|i| &mut i.fail_next_delete)?;
        inner.values.remove(key);
        Ok(())
    }
}
