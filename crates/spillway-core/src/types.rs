//! Shared types used across spillway crates.

use std::fmt;

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Cloud-assigned server identifier.
pub type InstanceId = String;

/// Load-balancer pool member identifier.
pub type MemberId = String;

/// How an adjustment amount is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    /// The amount is the new capacity.
    Exact,
    /// The amount is added to the current capacity.
    Delta,
    /// The amount is a percentage of the current capacity.
    Percent,
}

impl fmt::Display for AdjustmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustmentType::Exact => write!(f, "exact"),
            AdjustmentType::Delta => write!(f, "delta"),
            AdjustmentType::Percent => write!(f, "percent"),
        }
    }
}

/// Concrete launch properties for new instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchTemplate {
    pub image: String,
    pub flavor: String,
    pub key_name: Option<String>,
    pub user_data: Option<String>,
    #[serde(default)]
    pub security_groups: Vec<String>,
}

/// Batch sizing for same-region template updates. Applied by the host's
/// template mechanism, not by the reconciler itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingUpdatePolicy {
    #[serde(default)]
    pub min_in_service: u32,
    #[serde(default = "default_batch_size")]
    pub max_batch_size: u32,
    /// Seconds to pause between batches.
    #[serde(default)]
    pub pause_time: u64,
}

fn default_batch_size() -> u32 {
    1
}

impl Default for RollingUpdatePolicy {
    fn default() -> Self {
        RollingUpdatePolicy {
            min_in_service: 0,
            max_batch_size: 1,
            pause_time: 0,
        }
    }
}

/// A scaling group definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: Option<u32>,
    /// Seconds after an adjustment during which further adjustment requests
    /// are discarded.
    #[serde(default)]
    pub cooldown: u64,
    #[serde(default)]
    pub rolling_update: RollingUpdatePolicy,
    /// Launch properties for new instances. Exactly one of this and
    /// `instance_id` must be set.
    pub launch_template: Option<LaunchTemplate>,
    /// Existing instance whose launch settings seed the group.
    pub instance_id: Option<InstanceId>,
    pub home_subnet: String,
    pub overflow_subnet: String,
    pub overflow_region: String,
    /// Load-balancer pool the group's members are registered in.
    pub lb_pool: String,
    #[serde(default = "default_member_port")]
    pub member_port: u16,
}

fn default_member_port() -> u16 {
    80
}

impl GroupConfig {
    /// Check the invariants that block group create/update when broken.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.launch_template.is_some() == self.instance_id.is_some() {
            return Err(ValidationError::AmbiguousSource);
        }
        if self.min_size > self.max_size {
            return Err(ValidationError::BoundsInverted {
                min: self.min_size,
                max: self.max_size,
            });
        }
        if let Some(desired) = self.desired_capacity
            && (desired < self.min_size || desired > self.max_size)
        {
            return Err(ValidationError::DesiredOutOfBounds {
                desired,
                min: self.min_size,
                max: self.max_size,
            });
        }
        Ok(())
    }

    /// Capacity a freshly created group starts at.
    pub fn initial_capacity(&self) -> u32 {
        self.desired_capacity.unwrap_or(self.min_size)
    }

    /// Clamp `capacity` into the group's bounds.
    pub fn clamp(&self, capacity: u32) -> u32 {
        capacity.clamp(self.min_size, self.max_size)
    }
}
