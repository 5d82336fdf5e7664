//! # flow-client
//!
//! Offline-first application-state store for flowstate.
//!
//! This is the layer applications embed. It owns the single [`AppState`],
//! persists a snapshot through a [`PersistedStore`], defers mutating work
//! while offline and replays it through a [`RemoteService`] once
//! connectivity returns.
//!
//! ## Features
//!
//! - **Reducer-only mutation**: every change goes through flow-core's reducer
//! - **Durable offline queue**: deferred actions survive restarts, drained FIFO
//! - **Single-flight sync**: overlapping sync triggers queue behind each other
//! - **Pluggable collaborators**: store and remote service are traits (SQLite, in-memory, mock)
//!
//! ## Example
//!
//! ```ignore
//! use flowstate_client::{ClientConfig, MemoryStore, MockRemote, SyncController};
//!
//! let controller =
//!     SyncController::new(ClientConfig::default(), MemoryStore::new(), MockRemote::new());
//! controller.load_persisted_state().await;
//!
//! // Deferred while offline, replayed when connectivity comes back
//! controller.on_connectivity_change(Some(false)).await;
//! controller.handle_offline_action(RemoteAction::SetLanguage { language: "hi".into() }).await;
//! controller.on_connectivity_change(Some(true)).await;
//! ```
//!
//! [`AppState`]: flowstate_core::AppState

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod error;
pub mod handle;
pub mod logging;
pub mod remote;
pub mod store;
pub mod tasks;

pub use config::{ClientConfig, ConfigError, LoggingConfig, QueueSettings, SyncSettings};
pub use controller::{ActionOutcome, DrainReport, SyncController, SyncOutcome};
pub use error::{ClientError, StoreError};
pub use handle::{LoadingGuard, StateHandle};
pub use logging::init_tracing;
pub use remote::{MockRemote, RemoteError, RemoteService};
pub use store::{MemoryStore, PersistedStore, SqliteStore};
pub use tasks::{spawn_connectivity_listener, spawn_periodic_sync, Reachability};
