//! Store error types.

use thiserror::Error;

/// Errors reported by a room store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Room, game document or player does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The store rejected the mutation
    #[error("Write rejected: {0}")]
    WriteError(String),

    /// Conditional write lost against a newer version
    #[error("Stale write: expected version {expected}, store is at {found}")]
    StaleWrite { expected: u64, found: u64 },

    /// Document could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(String),
}
