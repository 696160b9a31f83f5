//! Capacity reconciliation across an ordered list of region targets.
//!
//! The reconciler owns no capacity numbers of its own. Every pass starts by
//! counting what each region actually holds, picks exactly one region to
//! absorb the difference, and finishes by reconverging the load-balancer
//! pool on the union of every region's member addresses.

use std::sync::Arc;

use tracing::{debug, info};

use spillway_members::{PoolMembership, RefreshStats};
use spillway_placement::RegionTarget;

use crate::error::{ControllerError, ControllerResult};

/// Per-region instance counts for one reconciliation pass. Recomputed for
/// every decision, never persisted.
#[derive(Debug, Clone)]
pub struct CapacitySnapshot {
    /// `(region name, instance count)` in placement-priority order.
    pub counts: Vec<(String, u32)>,
}

impl CapacitySnapshot {
    pub fn total(&self) -> u32 {
        self.counts.iter().map(|(_, count)| count).sum()
    }
}

/// What one resize pass did.
#[derive(Debug, Clone)]
pub struct ResizeReport {
    /// Capacity before the pass.
    pub previous: u32,
    /// Capacity asked for.
    pub target: u32,
    /// Region that absorbed the change, when there was one.
    pub region: Option<String>,
    /// Pool convergence performed after the capacity change.
    pub refresh: RefreshStats,
}

/// Moves a group's capacity between regions.
///
/// Targets are held in placement-priority order. Growth lands in the first
/// region reporting quota headroom, falling back to the last region when
/// none does. Shrinkage always comes out of the last region that still
/// holds instances, even if an earlier region grew more recently.
pub struct Reconciler {
    group: String,
    targets: Vec<Arc<dyn RegionTarget>>,
    membership: Arc<PoolMembership>,
}

impl Reconciler {
    /// Build a reconciler over `targets`, which must be non-empty.
    pub fn new(
        group: &str,
        targets: Vec<Arc<dyn RegionTarget>>,
        membership: Arc<PoolMembership>,
    ) -> ControllerResult<Self> {
        if targets.is_empty() {
            return Err(ControllerError::NoRegionTargets);
        }
        Ok(Reconciler {
            group: group.to_string(),
            targets,
            membership,
        })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn targets(&self) -> &[Arc<dyn RegionTarget>] {
        &self.targets
    }

    pub fn membership(&self) -> &Arc<PoolMembership> {
        &self.membership
    }

    /// Count the group's instances in every region.
    pub async fn snapshot(&self) -> ControllerResult<CapacitySnapshot> {
        let mut counts = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let ids = target.list_ids().await?;
            counts.push((target.name().to_string(), ids.len() as u32));
        }
        Ok(CapacitySnapshot { counts })
    }

    /// The group's current capacity, summed over every region.
    pub async fn current_capacity(&self) -> ControllerResult<u32> {
        Ok(self.snapshot().await?.total())
    }

    /// Move the group to `target_capacity`. The caller is responsible for
    /// clamping the value to the group's bounds.
    ///
    /// Every successful pass, including one that moves nothing, ends with a
    /// pool-membership refresh, so drift left behind by an earlier partial
    /// failure gets repaired on the next resize. A create or delete failure
    /// propagates without the refresh; whatever was created before the
    /// failure stays recorded.
    pub async fn resize(&self, target_capacity: u32) -> ControllerResult<ResizeReport> {
        let snapshot = self.snapshot().await?;
        let current = snapshot.total();
        let delta = i64::from(target_capacity) - i64::from(current);

        let region = if delta > 0 {
            let target = self.grow_target().await?;
            info!(
                group = %self.group,
                region = target.name(),
                current,
                target_capacity,
                "growing capacity"
            );
            target.create(delta as u32).await?;
            Some(target.name().to_string())
        } else if delta < 0 {
            let target = self.shrink_target(&snapshot)?;
            info!(
                group = %self.group,
                region = target.name(),
                current,
                target_capacity,
                "shrinking capacity"
            );
            target.delete(delta.unsigned_abs() as u32).await?;
            Some(target.name().to_string())
        } else {
            debug!(group = %self.group, capacity = current, "already at target capacity");
            None
        };

        let refresh = self.refresh_members().await?;
        Ok(ResizeReport {
            previous: current,
            target: target_capacity,
            region,
            refresh,
        })
    }

    /// Converge the pool onto the union of every region's member addresses.
    pub async fn refresh_members(&self) -> ControllerResult<RefreshStats> {
        let mut live = Vec::new();
        for target in &self.targets {
            live.extend(target.member_addresses().await?);
        }
        Ok(self.membership.refresh(&live).await?)
    }

    /// Whether every region's last change has settled.
    pub async fn ready(&self) -> ControllerResult<bool> {
        for target in &self.targets {
            if !target.ready().await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// First target reporting headroom. The last target absorbs the growth
    /// when nobody does, whatever it claims about its own headroom.
    async fn grow_target(&self) -> ControllerResult<&Arc<dyn RegionTarget>> {
        let (last, rest) = self
            .targets
            .split_last()
            .ok_or(ControllerError::NoRegionTargets)?;
        for target in rest {
            if target.has_headroom().await {
                return Ok(target);
            }
        }
        Ok(last)
    }

    /// Last target that still holds instances, or the first when the group
    /// is empty.
    fn shrink_target(
        &self,
        snapshot: &CapacitySnapshot,
    ) -> ControllerResult<&Arc<dyn RegionTarget>> {
        let index = snapshot
            .counts
            .iter()
            .rposition(|(_, count)| *count > 0)
            .unwrap_or(0);
        self.targets
            .get(index)
            .ok_or(ControllerError::NoRegionTargets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use spillway_cloud::LaunchRequest;
    use spillway_cloud::sim::{SimCompute, SimLb, SimQuota, SimTemplateGroup};
    use spillway_core::LaunchTemplate;
    use spillway_placement::{BootTuning, HomeRegion, OverflowRegion, PlacementError};
    use spillway_state::GroupStore;

    struct Fixture {
        compute: Arc<SimCompute>,
        lb: Arc<SimLb>,
        templates: Arc<SimTemplateGroup>,
        store: GroupStore,
        reconciler: Reconciler,
    }

    fn make_fixture(quota: SimQuota, home_count: u32) -> Fixture {
        let compute = Arc::new(SimCompute::new());
        let lb = Arc::new(SimLb::with_pools(&["pool-web"]));
        let templates = Arc::new(SimTemplateGroup::with_count(home_count));
        let store = GroupStore::open_in_memory().unwrap();
        let membership = Arc::new(PoolMembership::new(
            lb.clone(),
            store.clone(),
            "web",
            "pool-web",
            80,
        ));
        let home = HomeRegion::new("region-one", templates.clone(), Arc::new(quota));
        let template = LaunchTemplate {
            image: "img-web".to_string(),
            flavor: "m1.small".to_string(),
            key_name: None,
            user_data: None,
            security_groups: vec![],
        };
        let launch = LaunchRequest::from_template(&template, "subnet-ovf");
        let overflow = OverflowRegion::new(
            "region-two",
            "web",
            compute.clone(),
            store.clone(),
            membership.clone(),
            launch,
        )
        .with_tuning(BootTuning {
            timeout: Duration::from_millis(250),
            poll_interval: Duration::from_millis(1),
        });
        let reconciler =
            Reconciler::new("web", vec![Arc::new(home), Arc::new(overflow)], membership).unwrap();
        Fixture {
            compute,
            lb,
            templates,
            store,
            reconciler,
        }
    }

    #[tokio::test]
    async fn no_targets_is_rejected() {
        let lb = Arc::new(SimLb::with_pools(&["pool-web"]));
        let store = GroupStore::open_in_memory().unwrap();
        let membership = Arc::new(PoolMembership::new(lb, store, "web", "pool-web", 80));

        let err = Reconciler::new("web", Vec::new(), membership).err().unwrap();
        assert!(matches!(err, ControllerError::NoRegionTargets));
    }

    #[tokio::test]
    async fn growth_lands_in_home_region_with_headroom() {
        let fx = make_fixture(SimQuota::roomy(), 0);

        let report = fx.reconciler.resize(3).await.unwrap();
        assert_eq!(report.previous, 0);
        assert_eq!(report.region.as_deref(), Some("region-one"));
        assert_eq!(fx.templates.count(), 3);
        assert_eq!(fx.store.overflow_count("web").unwrap(), 0);
        // The new members were registered by the closing refresh.
        assert_eq!(report.refresh.registered, 3);
        assert_eq!(fx.lb.member_count("pool-web"), 3);
    }

    #[tokio::test]
    async fn growth_spills_to_overflow_without_headroom() {
        let fx = make_fixture(SimQuota::exhausted(), 0);

        let report = fx.reconciler.resize(3).await.unwrap();
        assert_eq!(report.region.as_deref(), Some("region-two"));
        assert_eq!(fx.store.overflow_count("web").unwrap(), 3);
        assert!(fx.templates.scale_calls().is_empty());
        assert_eq!(fx.lb.member_count("pool-web"), 3);
    }

    #[tokio::test]
    async fn unreachable_quota_spills_to_overflow() {
        let fx = make_fixture(SimQuota::failing("limits endpoint down"), 0);

        let report = fx.reconciler.resize(1).await.unwrap();
        assert_eq!(report.region.as_deref(), Some("region-two"));
        assert_eq!(fx.store.overflow_count("web").unwrap(), 1);
    }

    #[tokio::test]
    async fn shrink_comes_from_overflow_first() {
        let fx = make_fixture(SimQuota::exhausted(), 2);
        fx.reconciler.resize(4).await.unwrap();
        let overflow_ids = fx.store.overflow_instances("web").unwrap();
        assert_eq!(overflow_ids.len(), 2);

        let report = fx.reconciler.resize(3).await.unwrap();
        assert_eq!(report.region.as_deref(), Some("region-two"));
        assert_eq!(fx.store.overflow_count("web").unwrap(), 1);
        assert_eq!(fx.templates.count(), 2);
        // Newest overflow instance goes first.
        assert_eq!(fx.compute.terminations(), vec![overflow_ids[1].clone()]);
    }

    #[tokio::test]
    async fn shrink_falls_back_to_home_when_overflow_is_empty() {
        let fx = make_fixture(SimQuota::roomy(), 3);
        fx.reconciler.refresh_members().await.unwrap();
        assert_eq!(fx.lb.member_count("pool-web"), 3);

        let report = fx.reconciler.resize(1).await.unwrap();
        assert_eq!(report.region.as_deref(), Some("region-one"));
        assert_eq!(fx.templates.scale_calls(), vec![1]);
        assert_eq!(fx.templates.count(), 1);
        // The dropped members were pruned from the pool by the refresh.
        assert_eq!(fx.lb.member_count("pool-web"), 1);
    }

    #[tokio::test]
    async fn shrink_beyond_overflow_holdings_fails_fast() {
        let fx = make_fixture(SimQuota::exhausted(), 2);
        fx.reconciler.resize(3).await.unwrap();
        assert_eq!(fx.store.overflow_count("web").unwrap(), 1);

        // Three below current, but the overflow region only holds one.
        let err = fx.reconciler.resize(0).await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Placement(PlacementError::StateDrift { .. })
        ));
        assert_eq!(fx.compute.terminate_calls(), 0);
        assert_eq!(fx.store.overflow_count("web").unwrap(), 1);
    }

    #[tokio::test]
    async fn zero_delta_still_repairs_the_pool() {
        let fx = make_fixture(SimQuota::roomy(), 1);
        let member_id = fx.lb.seed_member("pool-web", "10.9.9.9");
        fx.store
            .insert_pool_member("web", "10.9.9.9", &member_id)
            .unwrap();

        let report = fx.reconciler.resize(1).await.unwrap();
        assert_eq!(report.region, None);
        assert_eq!(report.refresh.registered, 1);
        assert_eq!(report.refresh.removed, 1);
        assert_eq!(fx.lb.addresses("pool-web"), vec!["10.0.0.10".to_string()]);
    }

    #[tokio::test]
    async fn failed_resize_skips_the_refresh() {
        let fx = make_fixture(SimQuota::roomy(), 1);
        let member_id = fx.lb.seed_member("pool-web", "10.9.9.9");
        fx.store
            .insert_pool_member("web", "10.9.9.9", &member_id)
            .unwrap();
        fx.templates.fail_next_scale("template engine down");

        assert!(fx.reconciler.resize(3).await.is_err());
        // No registrations, no pruning: the stale member is still there.
        assert_eq!(fx.lb.creates(), 0);
        assert_eq!(fx.lb.member_count("pool-web"), 1);
    }

    #[tokio::test]
    async fn capacity_sums_every_region() {
        let fx = make_fixture(SimQuota::exhausted(), 2);
        fx.reconciler.resize(5).await.unwrap();

        assert_eq!(fx.reconciler.current_capacity().await.unwrap(), 5);
        let snapshot = fx.reconciler.snapshot().await.unwrap();
        assert_eq!(
            snapshot.counts,
            vec![
                ("region-one".to_string(), 2),
                ("region-two".to_string(), 3)
            ]
        );
        // Both regions' members are in the pool.
        let addresses = fx.lb.addresses("pool-web");
        assert_eq!(addresses.len(), 5);
        assert!(addresses.iter().any(|a| a.starts_with("10.0.0.")));
        assert!(addresses.iter().any(|a| a.starts_with("203.0.113.")));
    }

    #[tokio::test]
    async fn ready_requires_every_region() {
        let fx = make_fixture(SimQuota::roomy(), 1);
        assert!(fx.reconciler.ready().await.unwrap());

        fx.templates.set_ready(false);
        assert!(!fx.reconciler.ready().await.unwrap());
    }
}
