//! Controller error type.

use spillway_core::ValidationError;
use spillway_members::MembershipError;
use spillway_placement::PlacementError;
use spillway_state::StateError;
use thiserror::Error;

pub type ControllerResult<T> = Result<T, ControllerError>;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid group configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("placement failed: {0}")]
    Placement(#[from] PlacementError),

    #[error("membership sync failed: {0}")]
    Membership(#[from] MembershipError),

    #[error("state store: {0}")]
    State(#[from] StateError),

    #[error("group has no region targets")]
    NoRegionTargets,
}
