//! Persisted store abstraction for flow-client.
//!
//! The controller treats durable storage as a plain key-value store of text
//! values. Absence of a key is a valid state, distinct from an empty value.
//! Only single-key operations are assumed to be linearizable.
//!
//! # Implementations
//!
//! - [`SqliteStore`] - durable, survives restarts
//! - [`MemoryStore`] - in-process, with failure injection for tests

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::StoreError;

/// Durable key-value storage for the persisted snapshot.
#[async_trait]
pub trait PersistedStore: Send + Sync {
    /// Read a key. `Ok(None)` means the key was never set (or was deleted).
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a key, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
