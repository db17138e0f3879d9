//! Error types for CRDT updates.

use thiserror::Error;

/// Errors an OR-Set update can report.
///
/// Both are recoverable: the state the update was applied to is unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ORSetError {
    /// Remove of an element that has no recorded entry.
    #[error("element not found")]
    NotFound,

    /// Batch add with nothing in it.
    #[error("batch add requires at least one element")]
    EmptyBatch,
}

pub type Result<T> = std::result::Result<T, ORSetError>;
