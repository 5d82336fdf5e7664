//! # flow-types
//!
//! Shared data model for the flowstate offline-first application-state core.
//!
//! This crate provides the foundational types used across all flowstate crates:
//! - [`ActionId`], [`Timestamp`] - Identity and ordering types
//! - [`UserRecord`], [`Notification`] - Application data carried in state
//! - [`RemoteAction`], [`QueuedAction`] - Replayable descriptions of deferred work
//! - [`Slot`] - Named persisted-snapshot slots and their text codec
//! - [`SnapshotError`] - Codec errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod action;
mod error;
mod ids;
mod model;
mod slots;

pub use action::{QueuedAction, RemoteAction};
pub use error::SnapshotError;
pub use ids::{ActionId, Timestamp};
pub use model::{Credentials, Notification, Session, UserRecord};
pub use slots::{decode_json, encode_json, Slot};
