//! The per-group scaling controller.
//!
//! One `GroupController` owns one scaling group end to end: adjustment
//! requests come in, get bounced off the cooldown window, turned into a
//! bounded capacity target, and handed to the reconciler between start and
//! end/error notifications. Lifecycle handlers cover what the host calls
//! on the group resource itself: create, update, readiness polling, and
//! delete.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use spillway_cloud::{Notifier, ScalingEvent, ScalingPhase};
use spillway_core::{AdjustmentType, GroupConfig, InstanceId, MemberId, ValidationError, new_capacity};
use spillway_state::{CooldownStamp, GroupStore};

use crate::error::ControllerResult;
use crate::reconciler::{Reconciler, ResizeReport};

/// What became of one adjustment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdjustOutcome {
    /// Discarded without effect: the group is inside its cooldown window.
    SkippedCooldown,
    /// The resize ran, possibly landing on the size the group already had.
    Adjusted { from: u32, to: u32 },
}

/// Instance ids one region currently holds.
#[derive(Debug, Clone, Serialize)]
pub struct RegionStatus {
    pub region: String,
    pub instances: Vec<InstanceId>,
}

/// Point-in-time view of a group, as served by the daemon's status
/// endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStatus {
    pub name: String,
    pub min_size: u32,
    pub max_size: u32,
    pub cooldown: u64,
    pub capacity: u32,
    pub regions: Vec<RegionStatus>,
    pub pool_members: BTreeMap<String, MemberId>,
    pub last_adjustment: Option<CooldownStamp>,
}

/// Controller for one scaling group.
///
/// All capacity movement runs under a single-flight gate, so two
/// adjustments arriving together are applied one after the other, each
/// seeing the capacity the previous one left behind.
pub struct GroupController {
    name: String,
    config: RwLock<GroupConfig>,
    store: GroupStore,
    reconciler: Reconciler,
    notifier: Arc<dyn Notifier>,
    flight: Mutex<()>,
    /// Set by create/update, consumed by the first completed readiness
    /// check, which runs one pool refresh on the transition.
    pending_refresh: AtomicBool,
}

impl GroupController {
    /// Build a controller. The configuration is validated here; nothing
    /// else runs until it passes.
    pub fn new(
        config: GroupConfig,
        store: GroupStore,
        reconciler: Reconciler,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(GroupController {
            name: config.name.clone(),
            config: RwLock::new(config),
            store,
            reconciler,
            notifier,
            flight: Mutex::new(()),
            pending_refresh: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clamp `capacity` to the group's current bounds.
    pub async fn clamp(&self, capacity: u32) -> u32 {
        self.config.read().await.clamp(capacity)
    }

    /// Apply one scaling adjustment, unless the cooldown forbids it.
    ///
    /// A request arriving inside the cooldown window is discarded whole: no
    /// notification, no capacity change, and no new stamp. Otherwise the
    /// new capacity is computed from `amount` and `kind`, clamped to the
    /// group's bounds, and the resize runs between a start and an end or
    /// error notification. The cooldown stamp is written whether the resize
    /// succeeds or fails, so a failed attempt still consumes the window.
    pub async fn adjust(
        &self,
        amount: i64,
        kind: AdjustmentType,
    ) -> ControllerResult<AdjustOutcome> {
        let _flight = self.flight.lock().await;
        let (cooldown, min_size, max_size) = {
            let config = self.config.read().await;
            (config.cooldown, config.min_size, config.max_size)
        };
        if self.cooling_down(cooldown)? {
            info!(group = %self.name, cooldown, "not adjusting, cooldown in progress");
            return Ok(AdjustOutcome::SkippedCooldown);
        }

        let current = self.reconciler.current_capacity().await?;
        let target = new_capacity(current, amount, kind, min_size, max_size);
        debug!(
            group = %self.name,
            current,
            target,
            amount,
            kind = %kind,
            "adjustment accepted"
        );

        self.notify(
            ScalingPhase::Start,
            amount,
            kind,
            current,
            format!("start resizing the group {}", self.name),
        );
        let result = self.reconciler.resize(target).await;
        match &result {
            Ok(report) => self.notify(
                ScalingPhase::End,
                amount,
                kind,
                report.target,
                format!("end resizing the group {}", self.name),
            ),
            Err(e) => self.notify(ScalingPhase::Error, amount, kind, current, e.to_string()),
        }
        self.store.stamp_adjustment(
            &self.name,
            CooldownStamp {
                at: epoch_secs(),
                reason: format!("{kind} : {amount}"),
            },
        )?;

        let report = result?;
        Ok(AdjustOutcome::Adjusted {
            from: report.previous,
            to: report.target,
        })
    }

    /// Resize straight to `target_capacity`, bypassing cooldown and
    /// notifications. The value is applied as given; callers clamp it.
    pub async fn resize(&self, target_capacity: u32) -> ControllerResult<ResizeReport> {
        let _flight = self.flight.lock().await;
        self.reconciler.resize(target_capacity).await
    }

    /// Bring a fresh group to its initial capacity.
    pub async fn handle_create(&self) -> ControllerResult<ResizeReport> {
        let _flight = self.flight.lock().await;
        let target = self.config.read().await.initial_capacity();
        info!(group = %self.name, target, "creating group");
        let report = self.reconciler.resize(target).await?;
        self.pending_refresh.store(true, Ordering::SeqCst);
        Ok(report)
    }

    /// Replace the group's configuration and re-apply capacity under the
    /// new bounds.
    ///
    /// The new desired capacity wins when set; otherwise the group keeps
    /// its current size, clamped to the new bounds. The group's name is
    /// fixed at construction and is not consulted here.
    pub async fn handle_update(&self, new_config: GroupConfig) -> ControllerResult<ResizeReport> {
        new_config.validate()?;
        let _flight = self.flight.lock().await;
        let current = self.reconciler.current_capacity().await?;
        let target = new_config.clamp(new_config.desired_capacity.unwrap_or(current));
        info!(group = %self.name, current, target, "updating group");
        *self.config.write().await = new_config;
        let report = self.reconciler.resize(target).await?;
        self.pending_refresh.store(true, Ordering::SeqCst);
        Ok(report)
    }

    /// Whether the create that was started has settled everywhere.
    pub async fn check_create_complete(&self) -> ControllerResult<bool> {
        self.check_settled().await
    }

    /// Whether the update that was started has settled everywhere.
    pub async fn check_update_complete(&self) -> ControllerResult<bool> {
        self.check_settled().await
    }

    /// Tear the group down: every region's instances in reverse priority
    /// order, then whatever pool members are still recorded, then the
    /// group's persisted record.
    pub async fn handle_delete(&self) -> ControllerResult<()> {
        let _flight = self.flight.lock().await;
        for target in self.reconciler.targets().iter().rev() {
            target.teardown().await?;
        }
        self.reconciler.membership().deregister_all().await?;
        self.store.clear(&self.name)?;
        info!(group = %self.name, "group deleted");
        Ok(())
    }

    /// Point-in-time view of the group. Taken outside the single-flight
    /// gate; a resize in progress can show through.
    pub async fn status(&self) -> ControllerResult<GroupStatus> {
        let (min_size, max_size, cooldown) = {
            let config = self.config.read().await;
            (config.min_size, config.max_size, config.cooldown)
        };
        let mut regions = Vec::new();
        let mut capacity = 0;
        for target in self.reconciler.targets() {
            let instances = target.list_ids().await?;
            capacity += instances.len() as u32;
            regions.push(RegionStatus {
                region: target.name().to_string(),
                instances,
            });
        }
        Ok(GroupStatus {
            name: self.name.clone(),
            min_size,
            max_size,
            cooldown,
            capacity,
            regions,
            pool_members: self.store.pool_members(&self.name)?,
            last_adjustment: self.store.last_adjustment(&self.name)?,
        })
    }

    async fn check_settled(&self) -> ControllerResult<bool> {
        if !self.reconciler.ready().await? {
            return Ok(false);
        }
        if self.pending_refresh.swap(false, Ordering::SeqCst)
            && let Err(e) = self.reconciler.refresh_members().await
        {
            // Keep the refresh owed so the next check retries it.
            self.pending_refresh.store(true, Ordering::SeqCst);
            return Err(e);
        }
        Ok(true)
    }

    fn cooling_down(&self, cooldown: u64) -> ControllerResult<bool> {
        if cooldown == 0 {
            return Ok(false);
        }
        match self.store.last_adjustment(&self.name)? {
            Some(stamp) => Ok(stamp.at.saturating_add(cooldown) > epoch_secs()),
            None => Ok(false),
        }
    }

    fn notify(
        &self,
        phase: ScalingPhase,
        adjustment: i64,
        kind: AdjustmentType,
        capacity: u32,
        message: String,
    ) {
        self.notifier.notify(&ScalingEvent {
            group: self.name.clone(),
            phase,
            adjustment,
            adjustment_type: kind,
            capacity,
            message,
        });
    }
}

/// Seconds since the Unix epoch.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
