//! # flow-core
//!
//! Pure logic for flowstate (no I/O, instant tests).
//!
//! This crate implements the reducer, the offline action queue and the error
//! taxonomy without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Predictable replay of any action sequence
//!
//! The actual I/O (persisted store, remote service) is performed by
//! `flow-client`, which dispatches the actions and drives the queue.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod queue;
pub mod state;

pub use classify::{Classification, Classify, ErrorKind, QUEUED_MESSAGE};
pub use queue::{ActionQueue, Disposition, QueueError};
pub use state::{local_effect, Action, AppState, DEFAULT_LANGUAGE};
