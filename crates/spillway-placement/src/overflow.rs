//! Overflow-region target: direct server provisioning with pool
//! registration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use spillway_cloud::{CloudError, ComputeApi, InstanceInfo, LaunchRequest};
use spillway_core::InstanceId;
use spillway_members::PoolMembership;
use spillway_state::GroupStore;

use crate::error::{PlacementError, PlacementResult};
use crate::target::RegionTarget;

/// Boot-wait tuning for overflow provisioning.
#[derive(Debug, Clone)]
pub struct BootTuning {
    /// Longest to wait for one instance to reach running.
    pub timeout: Duration,
    /// Delay between describe polls.
    pub poll_interval: Duration,
}

impl Default for BootTuning {
    fn default() -> Self {
        BootTuning {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// The spill target. Servers are created directly through the compute API,
/// tracked oldest-first in the state store, and registered in the group's
/// pool once they run. Scale-down removes the newest instances first.
pub struct OverflowRegion {
    region: String,
    group: String,
    compute: Arc<dyn ComputeApi>,
    store: GroupStore,
    membership: Arc<PoolMembership>,
    launch: LaunchRequest,
    tuning: BootTuning,
}

impl OverflowRegion {
    pub fn new(
        region: &str,
        group: &str,
        compute: Arc<dyn ComputeApi>,
        store: GroupStore,
        membership: Arc<PoolMembership>,
        launch: LaunchRequest,
    ) -> Self {
        OverflowRegion {
            region: region.to_string(),
            group: group.to_string(),
            compute,
            store,
            membership,
            launch,
            tuning: BootTuning::default(),
        }
    }

    pub fn with_tuning(mut self, tuning: BootTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Describe-poll one instance until it reports running.
    async fn poll_until_running(&self, id: &InstanceId) -> PlacementResult<InstanceInfo> {
        let started = Instant::now();
        loop {
            let info = self.compute.describe_instance(id).await?;
            if info.is_running() {
                return Ok(info);
            }
            if started.elapsed() >= self.tuning.timeout {
                return Err(PlacementError::ProvisioningTimeout {
                    id: id.clone(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            sleep(self.tuning.poll_interval).await;
        }
    }
}

#[async_trait]
impl RegionTarget for OverflowRegion {
    fn name(&self) -> &str {
        &self.region
    }

    /// The overflow region always reports headroom; it is where placement
    /// lands when nothing else can take it. Creation failures surface from
    /// `create`.
    async fn has_headroom(&self) -> bool {
        true
    }

    async fn create(&self, count: u32) -> PlacementResult<Vec<InstanceId>> {
        let ids = self.compute.create_instances(&self.launch, count).await?;
        // Record every id before waiting on any boot, so a later timeout
        // cannot orphan an instance we already own.
        for id in &ids {
            self.store.push_overflow_instance(&self.group, id)?;
        }
        for id in &ids {
            let instance = self.poll_until_running(id).await?;
            match instance.preferred_address() {
                Some(address) => {
                    self.membership.register(address).await?;
                }
                None => {
                    warn!(
                        region = %self.region,
                        %id,
                        "running instance has no address, skipping registration"
                    );
                }
            }
        }
        let created = ids.len() as u32;
        if created < count {
            return Err(PlacementError::ShortProvision {
                requested: count,
                created,
            });
        }
        info!(
            region = %self.region,
            group = %self.group,
            created,
            "overflow instances provisioned"
        );
        Ok(ids)
    }

    async fn delete(&self, count: u32) -> PlacementResult<()> {
        let tracked = self.store.overflow_count(&self.group)? as u32;
        if tracked < count {
            return Err(PlacementError::StateDrift {
                requested: count,
                tracked,
            });
        }
        for _ in 0..count {
            // Checked against the tracked count above; concurrent mutation
            // is excluded by the per-group gate.
            let Some(id) = self.store.pop_overflow_instance(&self.group)? else {
                break;
            };
            match self.compute.describe_instance(&id).await {
                Ok(instance) => {
                    if let Some(address) = instance.preferred_address() {
                        self.membership.deregister(address).await?;
                    }
                    self.compute
                        .terminate_instances(std::slice::from_ref(&id))
                        .await?;
                    debug!(region = %self.region, %id, "overflow instance terminated");
                }
                Err(CloudError::InstanceNotFound(_)) => {
                    warn!(region = %self.region, %id, "tracked instance already gone");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn list_ids(&self) -> PlacementResult<Vec<InstanceId>> {
        Ok(self.store.overflow_instances(&self.group)?)
    }

    async fn member_addresses(&self) -> PlacementResult<Vec<String>> {
        let mut addresses = Vec::new();
        for id in self.store.overflow_instances(&self.group)? {
            match self.compute.describe_instance(&id).await {
                Ok(instance) => {
                    if let Some(address) = instance.preferred_address() {
                        addresses.push(address.to_string());
                    }
                }
                Err(CloudError::InstanceNotFound(_)) => {
                    warn!(region = %self.region, %id, "tracked instance missing from region");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(addresses)
    }

    async fn ready(&self) -> PlacementResult<bool> {
        for id in self.store.overflow_instances(&self.group)? {
            match self.compute.describe_instance(&id).await {
                Ok(instance) if instance.is_running() => {}
                Ok(_) => return Ok(false),
                Err(CloudError::InstanceNotFound(_)) => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spillway_cloud::sim::{SimCompute, SimLb};
    use spillway_core::LaunchTemplate;

    struct Fixture {
        compute: Arc<SimCompute>,
        lb: Arc<SimLb>,
        store: GroupStore,
        overflow: OverflowRegion,
    }

    fn make_fixture(compute: SimCompute) -> Fixture {
        let compute = Arc::new(compute);
        let lb = Arc::new(SimLb::with_pools(&["pool-web"]));
        let store = GroupStore::open_in_memory().unwrap();
        let membership = Arc::new(PoolMembership::new(
            lb.clone(),
            store.clone(),
            "web",
            "pool-web",
            80,
        ));
        let template = LaunchTemplate {
            image: "img-web".to_string(),
            flavor: "m1.small".to_string(),
            key_name: None,
            user_data: None,
            security_groups: vec!["default".to_string()],
        };
        let launch = LaunchRequest::from_template(&template, "subnet-ovf");
        let overflow = OverflowRegion::new(
            "region-two",
            "web",
            compute.clone(),
            store.clone(),
            membership,
            launch,
        )
        .with_tuning(BootTuning {
            timeout: Duration::from_millis(250),
            poll_interval: Duration::from_millis(1),
        });
        Fixture {
            compute,
            lb,
            store,
            overflow,
        }
    }

    #[tokio::test]
    async fn create_records_boots_and_registers() {
        let fx = make_fixture(SimCompute::with_boot_polls(2));
        let ids = fx.overflow.create(2).await.unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(fx.store.overflow_instances("web").unwrap(), ids);
        assert_eq!(fx.lb.member_count("pool-web"), 2);
        assert!(fx.overflow.ready().await.unwrap());
    }

    #[tokio::test]
    async fn short_batch_keeps_what_exists_and_errors() {
        let fx = make_fixture(SimCompute::new());
        fx.compute.cap_next_create(1);

        let err = fx.overflow.create(3).await.unwrap_err();
        assert!(matches!(
            err,
            PlacementError::ShortProvision {
                requested: 3,
                created: 1
            }
        ));
        // The one instance that exists is recorded and registered.
        assert_eq!(fx.store.overflow_count("web").unwrap(), 1);
        assert_eq!(fx.lb.member_count("pool-web"), 1);
    }

    #[tokio::test]
    async fn failed_batch_records_nothing() {
        let fx = make_fixture(SimCompute::new());
        fx.compute.fail_next_create("quota exceeded concurrently");

        let err = fx.overflow.create(2).await.unwrap_err();
        assert!(matches!(err, PlacementError::Cloud(_)));
        assert_eq!(fx.store.overflow_count("web").unwrap(), 0);
    }

    #[tokio::test]
    async fn boot_timeout_leaves_instance_recorded() {
        let fx = make_fixture(SimCompute::with_boot_polls(10_000));

        let err = fx.overflow.create(1).await.unwrap_err();
        assert!(matches!(err, PlacementError::ProvisioningTimeout { .. }));
        // No rollback: the instance stays tracked for a later pass.
        assert_eq!(fx.store.overflow_count("web").unwrap(), 1);
        assert_eq!(fx.compute.terminate_calls(), 0);
    }

    #[tokio::test]
    async fn delete_removes_newest_first() {
        let fx = make_fixture(SimCompute::new());
        let ids = fx.overflow.create(3).await.unwrap();

        fx.overflow.delete(2).await.unwrap();
        assert_eq!(
            fx.store.overflow_instances("web").unwrap(),
            vec![ids[0].clone()]
        );
        // Newest terminated first.
        assert_eq!(fx.compute.terminations(), vec![ids[2].clone(), ids[1].clone()]);
        assert_eq!(fx.lb.member_count("pool-web"), 1);
    }

    #[tokio::test]
    async fn delete_beyond_tracked_terminates_nothing() {
        let fx = make_fixture(SimCompute::new());
        fx.overflow.create(1).await.unwrap();

        let err = fx.overflow.delete(2).await.unwrap_err();
        assert!(matches!(
            err,
            PlacementError::StateDrift {
                requested: 2,
                tracked: 1
            }
        ));
        assert_eq!(fx.compute.terminate_calls(), 0);
        assert_eq!(fx.store.overflow_count("web").unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_skips_instances_that_vanished() {
        let fx = make_fixture(SimCompute::new());
        fx.store.push_overflow_instance("web", "i-9999").unwrap();

        fx.overflow.delete(1).await.unwrap();
        assert_eq!(fx.store.overflow_count("web").unwrap(), 0);
        assert_eq!(fx.compute.terminate_calls(), 0);
    }

    #[tokio::test]
    async fn ready_waits_for_pending_instances() {
        let fx = make_fixture(SimCompute::new());
        // Bypass create() so the instance has unconsumed boot polls.
        let compute_direct = SimCompute::with_boot_polls(1);
        let launch = fx.overflow.launch.clone();
        let ids = compute_direct.create_instances(&launch, 1).await.unwrap();
        let overflow = OverflowRegion::new(
            "region-two",
            "web",
            Arc::new(compute_direct),
            fx.store.clone(),
            Arc::new(PoolMembership::new(
                fx.lb.clone(),
                fx.store.clone(),
                "web",
                "pool-web",
                80,
            )),
            launch,
        );
        fx.store.push_overflow_instance("web", &ids[0]).unwrap();

        assert!(!overflow.ready().await.unwrap());
        assert!(overflow.ready().await.unwrap());
    }

    #[tokio::test]
    async fn member_addresses_prefer_public() {
        let fx = make_fixture(SimCompute::new());
        fx.overflow.create(1).await.unwrap();

        let addresses = fx.overflow.member_addresses().await.unwrap();
        assert_eq!(addresses.len(), 1);
        assert!(addresses[0].starts_with("203.0.113."));
    }

    #[tokio::test]
    async fn teardown_removes_instances_and_members() {
        let fx = make_fixture(SimCompute::new());
        fx.overflow.create(3).await.unwrap();

        fx.overflow.teardown().await.unwrap();
        assert_eq!(fx.store.overflow_count("web").unwrap(), 0);
        assert_eq!(fx.compute.live_count(), 0);
        assert_eq!(fx.lb.member_count("pool-web"), 0);

        // An empty region tears down to nothing without any API traffic.
        fx.overflow.teardown().await.unwrap();
        assert_eq!(fx.compute.terminate_calls(), 3);
    }
}
