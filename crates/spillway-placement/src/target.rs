//! Region placement strategy.

use async_trait::async_trait;
use spillway_core::InstanceId;

use crate::error::PlacementResult;

/// One region a group can place instances in.
///
/// The reconciler walks its targets in priority order: growth goes to the
/// first target reporting headroom, shrinkage to the last target that still
/// holds instances. Implementations own their region's bookkeeping; the
/// reconciler never tracks ids itself.
#[async_trait]
pub trait RegionTarget: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this region can take more instances. Answering is not
    /// allowed to fail: implementations map query errors to false.
    async fn has_headroom(&self) -> bool;

    /// Add `count` instances. Implementations record what they create as
    /// they create it; a partial batch is an error raised after the
    /// recording, never a rollback.
    async fn create(&self, count: u32) -> PlacementResult<Vec<InstanceId>>;

    /// Remove the `count` most recently added instances.
    async fn delete(&self, count: u32) -> PlacementResult<()>;

    /// Ids of the instances this region currently holds for the group.
    async fn list_ids(&self) -> PlacementResult<Vec<InstanceId>>;

    /// Reachable addresses of the region's current members, skipping
    /// members that do not have one yet.
    async fn member_addresses(&self) -> PlacementResult<Vec<String>>;

    /// Whether the region's last create/update has settled.
    async fn ready(&self) -> PlacementResult<bool>;

    /// Remove every instance this region holds for the group, newest first.
    /// Regions whose members are deleted together with the enclosing group
    /// resource override this with a no-op.
    async fn teardown(&self) -> PlacementResult<()> {
        let count = self.list_ids().await?.len() as u32;
        if count > 0 {
            self.delete(count).await?;
        }
        Ok(())
    }
}
