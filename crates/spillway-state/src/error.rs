//! Group store error type.

use thiserror::Error;

/// Result type alias for group store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Failures from the group store, grouped by site: opening the database,
/// running a transaction against it, or round-tripping a record through
/// its JSON encoding. The redb detail rides along as the message.
#[derive(Debug, Error)]
pub enum StateError {
    /// The database could not be created or opened.
    #[error("failed to open group store: {0}")]
    Open(String),

    /// A transaction failed partway: begin, table open, read, write, or
    /// commit.
    #[error("group store transaction failed: {0}")]
    Storage(String),

    /// A group record would not encode to or decode from JSON.
    #[error("group record encoding failed: {0}")]
    Codec(String),
}
