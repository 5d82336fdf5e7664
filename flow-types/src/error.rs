//! Error types for the persisted-snapshot codec.

use thiserror::Error;

use crate::slots::Slot;

/// Errors converting between slot text and typed values.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A value could not be rendered as JSON text.
    #[error("failed to encode slot {slot}: {source}")]
    Encode {
        /// The slot being written.
        slot: Slot,
        /// Underlying serializer error.
        #[source]
        source: serde_json::Error,
    },

    /// Stored text is not valid for the slot's type.
    #[error("failed to decode slot {slot}: {source}")]
    Decode {
        /// The slot being read.
        slot: Slot,
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },
}
