//! Placement and provisioning error types.

use spillway_core::InstanceId;
use thiserror::Error;

/// Result type alias for placement operations.
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Errors raised while choosing a region or provisioning instances in one.
#[derive(Debug, Error)]
pub enum PlacementError {
    /// The absolute-limits query failed or came back without the metrics
    /// the oracle needs.
    #[error("quota query failed: {0}")]
    QuotaQuery(String),

    /// A batch create returned fewer instances than requested. The ones
    /// that exist are recorded and kept.
    #[error("short provision: requested {requested}, created {created}")]
    ShortProvision { requested: u32, created: u32 },

    /// An instance did not reach running within the boot timeout. Nothing
    /// is rolled back.
    #[error("instance {id} not running after {waited_secs}s")]
    ProvisioningTimeout { id: InstanceId, waited_secs: u64 },

    /// A scale-down asked for more instances than the store tracks.
    #[error("state drift: asked to remove {requested} overflow instances, tracking {tracked}")]
    StateDrift { requested: u32, tracked: u32 },

    #[error("membership error: {0}")]
    Membership(#[from] spillway_members::MembershipError),

    #[error("cloud error: {0}")]
    Cloud(#[from] spillway_cloud::CloudError),

    #[error("state store error: {0}")]
    State(#[from] spillway_state::StateError),
}
