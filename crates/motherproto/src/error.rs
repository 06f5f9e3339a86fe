//! Error taxonomy for store operations.
//!
//! Every operation surfaces one of these typed variants; nothing is
//! signalled through ad hoc strings or swallowed. `Unavailable` is the only
//! kind a caller might reasonably retry; `Conflict` and `Ambiguous` require
//! caller-side disambiguation.

use thiserror::Error;

use crate::record::Record;
use crate::tags::TagError;

/// Why a move was rejected.
///
/// All three checks run on the namespace-stripped source and destination
/// tag-sets, so a move is evaluated purely on the user-meaningful tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveConflict {
    #[error("source is equal to destination")]
    SourceEqualsDestination,

    #[error("source is a subset of destination")]
    SourceSubsetOfDestination,

    #[error("destination is a subset of source")]
    DestinationSubsetOfSource,
}

/// Typed result surface of every store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record, tag-set, or digest matches.
    #[error("no records match")]
    NotFound,

    /// The query matched more than one tag-set where exactly one was
    /// required; carries the latest record per matching tag-set.
    #[error("query matches {} tag-sets", .0.len())]
    Ambiguous(Vec<Record>),

    /// Owner identity missing or not recognized.
    #[error("owner identity is missing or not recognized")]
    Unauthorized,

    /// Invalid move preconditions.
    #[error("cannot move: {0}")]
    Conflict(MoveConflict),

    /// Transport or storage backend failure; retryable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Malformed input (bad tags, bad digest, empty tag-set).
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl StoreError {
    /// The wire `kind` string clients pattern-match on.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound => "Not found",
            StoreError::Ambiguous(_) => "Ambiguous",
            StoreError::Unauthorized => "Unauthorized",
            StoreError::Conflict(_) => "Conflict",
            StoreError::Unavailable(_) => "Unavailable",
            StoreError::Invalid(_) => "Invalid",
        }
    }

    /// Wrap a backend failure as `Unavailable`.
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<TagError> for StoreError {
    fn from(err: TagError) -> Self {
        StoreError::Invalid(err.to_string())
    }
}

impl From<MoveConflict> for StoreError {
    fn from(conflict: MoveConflict) -> Self {
        StoreError::Conflict(conflict)
    }
}
