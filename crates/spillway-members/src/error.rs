//! Membership synchronizer error types.

use thiserror::Error;

/// Result type alias for membership operations.
pub type MembershipResult<T> = Result<T, MembershipError>;

/// Errors that can occur while converging pool membership.
#[derive(Debug, Error)]
pub enum MembershipError {
    /// Asked to deregister an address we never recorded a member for. This
    /// is state drift; it is surfaced, not guessed around.
    #[error("no pool member recorded for address {0}")]
    NotFound(String),

    #[error("cloud error: {0}")]
    Cloud(#[from] spillway_cloud::CloudError),

    #[error("state store error: {0}")]
    State(#[from] spillway_state::StateError),
}
