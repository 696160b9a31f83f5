//! In-memory cloud backends for tests and `spillwayd`.
//!
//! Each backend keeps plain data behind a `std::sync::Mutex` and supports
//! the fault injection the controller's failure paths need: boot delays,
//! short batches, failed creates, quota exhaustion, unreachable quota APIs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use spillway_core::{InstanceId, MemberId};
use tracing::debug;

use crate::compute::{ComputeApi, InstanceInfo, InstanceStatus, LaunchRequest};
use crate::error::{CloudError, CloudResult};
use crate::lbaas::{LbApi, PoolMember};
use crate::notify::{Notifier, ScalingEvent, ScalingPhase};
use crate::quota::{Limit, QuotaApi, limits};
use crate::templates::{TemplateMember, TemplateScaling};

// ── Compute ──────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SimInstance {
    info: InstanceInfo,
    /// Describes that still report pending before the instance runs.
    boots_after: u32,
}

#[derive(Debug, Default)]
struct ComputeState {
    instances: BTreeMap<InstanceId, SimInstance>,
    next_id: u64,
    cap_next_create: Option<u32>,
    fail_next_create: Option<String>,
    terminations: Vec<InstanceId>,
    terminate_calls: u32,
}

/// Simulated single-region compute service.
///
/// Fresh instances report `pending` for `boot_polls` describe calls before
/// flipping to `running`. `cap_next_create` makes the next batch come back
/// short; `fail_next_create` makes it fail outright.
pub struct SimCompute {
    boot_polls: u32,
    state: Mutex<ComputeState>,
}

impl SimCompute {
    pub fn new() -> Self {
        Self::with_boot_polls(0)
    }

    pub fn with_boot_polls(boot_polls: u32) -> Self {
        SimCompute {
            boot_polls,
            state: Mutex::new(ComputeState::default()),
        }
    }

    /// The next `create_instances` call returns at most `count` ids.
    pub fn cap_next_create(&self, count: u32) {
        self.state.lock().unwrap().cap_next_create = Some(count);
    }

    /// The next `create_instances` call fails with `message`.
    pub fn fail_next_create(&self, message: &str) {
        self.state.lock().unwrap().fail_next_create = Some(message.to_string());
    }

    /// Ids passed to `terminate_instances`, in call order.
    pub fn terminations(&self) -> Vec<InstanceId> {
        self.state.lock().unwrap().terminations.clone()
    }

    pub fn terminate_calls(&self) -> u32 {
        self.state.lock().unwrap().terminate_calls
    }

    /// Instances not yet terminated.
    pub fn live_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .instances
            .values()
            .filter(|i| i.info.status != InstanceStatus::Terminated)
            .count()
    }
}

impl Default for SimCompute {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComputeApi for SimCompute {
    async fn create_instances(
        &self,
        request: &LaunchRequest,
        count: u32,
    ) -> CloudResult<Vec<InstanceId>> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_next_create.take() {
            return Err(CloudError::api("compute", message));
        }
        let granted = match state.cap_next_create.take() {
            Some(cap) => count.min(cap),
            None => count,
        };
        let mut ids = Vec::with_capacity(granted as usize);
        for _ in 0..granted {
            state.next_id += 1;
            let n = state.next_id;
            let id = format!("i-{n:04}");
            let public_ip = request
                .network
                .associate_public_ip
                .then(|| format!("203.0.113.{n}"));
            let instance = SimInstance {
                info: InstanceInfo {
                    id: id.clone(),
                    status: InstanceStatus::Pending,
                    private_ip: Some(format!("10.8.0.{n}")),
                    public_ip,
                },
                boots_after: self.boot_polls,
            };
            debug!(%id, subnet = %request.network.subnet_id, "sim instance created");
            state.instances.insert(id.clone(), instance);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn terminate_instances(&self, ids: &[InstanceId]) -> CloudResult<()> {
        let mut state = self.state.lock().unwrap();
        state.terminate_calls += 1;
        for id in ids {
            let instance = state
                .instances
                .get_mut(id)
                .ok_or_else(|| CloudError::InstanceNotFound(id.clone()))?;
            instance.info.status = InstanceStatus::Terminated;
            state.terminations.push(id.clone());
        }
        Ok(())
    }

    async fn describe_instance(&self, id: &InstanceId) -> CloudResult<InstanceInfo> {
        let mut state = self.state.lock().unwrap();
        let instance = state
            .instances
            .get_mut(id)
            .ok_or_else(|| CloudError::InstanceNotFound(id.clone()))?;
        if instance.info.status == InstanceStatus::Pending {
            if instance.boots_after == 0 {
                instance.info.status = InstanceStatus::Running;
            } else {
                instance.boots_after -= 1;
            }
        }
        Ok(instance.info.clone())
    }
}

// ── Load balancer ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LbState {
    /// pool id → member id → address
    pools: BTreeMap<String, BTreeMap<MemberId, String>>,
    next_member: u64,
    creates: u32,
    deletes: u32,
}

/// Simulated load balancer holding any number of pools.
#[derive(Debug, Default)]
pub struct SimLb {
    state: Mutex<LbState>,
}

impl SimLb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pools(pools: &[&str]) -> Self {
        let lb = Self::new();
        for pool in pools {
            lb.add_pool(pool);
        }
        lb
    }

    pub fn add_pool(&self, pool_id: &str) {
        self.state
            .lock()
            .unwrap()
            .pools
            .entry(pool_id.to_string())
            .or_default();
    }

    /// Register a member behind the controller's back, as a foreign tenant
    /// or an operator would.
    pub fn seed_member(&self, pool_id: &str, address: &str) -> MemberId {
        let mut state = self.state.lock().unwrap();
        state.next_member += 1;
        let member_id = format!("member-{}", state.next_member);
        state
            .pools
            .entry(pool_id.to_string())
            .or_default()
            .insert(member_id.clone(), address.to_string());
        member_id
    }

    pub fn addresses(&self, pool_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .pools
            .get(pool_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn member_count(&self, pool_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .pools
            .get(pool_id)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Total `create_pool_member` calls across all pools.
    pub fn creates(&self) -> u32 {
        self.state.lock().unwrap().creates
    }

    /// Total `delete_pool_member` calls across all pools.
    pub fn deletes(&self) -> u32 {
        self.state.lock().unwrap().deletes
    }
}

#[async_trait]
impl LbApi for SimLb {
    async fn list_pool_members(&self, pool_id: &str) -> CloudResult<Vec<PoolMember>> {
        let state = self.state.lock().unwrap();
        let members = state
            .pools
            .get(pool_id)
            .ok_or_else(|| CloudError::PoolNotFound(pool_id.to_string()))?;
        Ok(members
            .iter()
            .map(|(id, address)| PoolMember {
                id: id.clone(),
                address: address.clone(),
            })
            .collect())
    }

    async fn create_pool_member(
        &self,
        pool_id: &str,
        address: &str,
        port: u16,
    ) -> CloudResult<MemberId> {
        let mut state = self.state.lock().unwrap();
        state.next_member += 1;
        state.creates += 1;
        let member_id = format!("member-{}", state.next_member);
        let members = state
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| CloudError::PoolNotFound(pool_id.to_string()))?;
        members.insert(member_id.clone(), address.to_string());
        debug!(%member_id, %address, port, pool = %pool_id, "sim pool member created");
        Ok(member_id)
    }

    async fn delete_pool_member(&self, member_id: &MemberId) -> CloudResult<()> {
        let mut state = self.state.lock().unwrap();
        state.deletes += 1;
        for members in state.pools.values_mut() {
            if members.remove(member_id).is_some() {
                return Ok(());
            }
        }
        Err(CloudError::MemberNotFound(member_id.clone()))
    }
}

// ── Quota ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct QuotaState {
    limits: Vec<Limit>,
    fail: Option<String>,
}

/// Simulated absolute-limits endpoint. Limits are a static snapshot set by
/// the constructor or `set_limits`; the sim does not account for instances
/// it launches.
#[derive(Debug, Default)]
pub struct SimQuota {
    state: Mutex<QuotaState>,
}

/// The six-metric absolute-limits set the headroom oracle reads.
pub fn standard_limits(
    max_instances: i64,
    instances_used: i64,
    max_cores: i64,
    cores_used: i64,
    max_ram: i64,
    ram_used: i64,
) -> Vec<Limit> {
    vec![
        Limit::new(limits::MAX_INSTANCES, max_instances),
        Limit::new(limits::INSTANCES_USED, instances_used),
        Limit::new(limits::MAX_CORES, max_cores),
        Limit::new(limits::CORES_USED, cores_used),
        Limit::new(limits::MAX_RAM, max_ram),
        Limit::new(limits::RAM_USED, ram_used),
    ]
}

impl SimQuota {
    /// Plenty of headroom on all three metrics.
    pub fn roomy() -> Self {
        Self::with_limits(standard_limits(10, 0, 20, 0, 51200, 0))
    }

    /// Instance quota fully consumed; cores and RAM still free.
    pub fn exhausted() -> Self {
        Self::with_limits(standard_limits(10, 10, 20, 0, 51200, 0))
    }

    /// Negative maxima, meaning no limits at all.
    pub fn unlimited() -> Self {
        Self::with_limits(standard_limits(-1, 0, -1, 0, -1, 0))
    }

    pub fn failing(message: &str) -> Self {
        let quota = Self::default();
        quota.state.lock().unwrap().fail = Some(message.to_string());
        quota
    }

    pub fn with_limits(limits: Vec<Limit>) -> Self {
        let quota = Self::default();
        quota.state.lock().unwrap().limits = limits;
        quota
    }

    pub fn set_limits(&self, limits: Vec<Limit>) {
        let mut state = self.state.lock().unwrap();
        state.limits = limits;
        state.fail = None;
    }

    /// Fill the instance quota, leaving the other metrics untouched.
    pub fn exhaust_instances(&self) {
        let mut state = self.state.lock().unwrap();
        let max = state
            .limits
            .iter()
            .find(|l| l.name == limits::MAX_INSTANCES)
            .map(|l| l.value)
            .unwrap_or(0);
        for limit in &mut state.limits {
            if limit.name == limits::INSTANCES_USED {
                limit.value = max;
            }
        }
    }
}

#[async_trait]
impl QuotaApi for SimQuota {
    async fn absolute_limits(&self) -> CloudResult<Vec<Limit>> {
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.fail {
            return Err(CloudError::api("limits", message.clone()));
        }
        Ok(state.limits.clone())
    }
}

// ── Template scaling ─────────────────────────────────────────────────────

#[derive(Debug)]
struct TemplateState {
    count: u32,
    ready: bool,
    fail_next_scale: Option<String>,
    scale_calls: Vec<u32>,
}

/// Simulated home-region template mechanism: a member count, a readiness
/// flag, and synthetic member addresses.
pub struct SimTemplateGroup {
    state: Mutex<TemplateState>,
}

impl SimTemplateGroup {
    pub fn new() -> Self {
        Self::with_count(0)
    }

    pub fn with_count(count: u32) -> Self {
        SimTemplateGroup {
            state: Mutex::new(TemplateState {
                count,
                ready: true,
                fail_next_scale: None,
                scale_calls: Vec::new(),
            }),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().unwrap().ready = ready;
    }

    pub fn fail_next_scale(&self, message: &str) {
        self.state.lock().unwrap().fail_next_scale = Some(message.to_string());
    }

    pub fn count(&self) -> u32 {
        self.state.lock().unwrap().count
    }

    /// Counts requested via `create_or_replace_templates`, in call order.
    pub fn scale_calls(&self) -> Vec<u32> {
        self.state.lock().unwrap().scale_calls.clone()
    }
}

impl Default for SimTemplateGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemplateScaling for SimTemplateGroup {
    async fn create_or_replace_templates(&self, count: u32) -> CloudResult<()> {
        let mut state = self.state.lock().unwrap();
        state.scale_calls.push(count);
        if let Some(message) = state.fail_next_scale.take() {
            return Err(CloudError::api("templates", message));
        }
        debug!(count, "sim template set re-issued");
        state.count = count;
        Ok(())
    }

    async fn members(&self) -> CloudResult<Vec<TemplateMember>> {
        let state = self.state.lock().unwrap();
        Ok((0..state.count)
            .map(|i| TemplateMember {
                id: format!("tmpl-{i}"),
                // Addresses only surface once the set has settled, like
                // real members that are still booting.
                address: state.ready.then(|| format!("10.0.0.{}", 10 + i)),
            })
            .collect())
    }

    async fn ready(&self) -> CloudResult<bool> {
        Ok(self.state.lock().unwrap().ready)
    }
}

// ── Notifications ────────────────────────────────────────────────────────

/// Notifier that remembers every event, for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ScalingEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScalingEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn phases(&self) -> Vec<ScalingPhase> {
        self.events.lock().unwrap().iter().map(|e| e.phase).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &ScalingEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
