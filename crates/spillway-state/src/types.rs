//! Persisted per-group state.

use serde::{Deserialize, Serialize};
use spillway_core::{InstanceId, MemberId};
use std::collections::BTreeMap;

/// When a group last attempted an adjustment, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownStamp {
    /// Epoch seconds of the attempt.
    pub at: u64,
    /// Human-readable trigger, e.g. `"delta : -1"`.
    pub reason: String,
}

/// Everything the controller persists for one scaling group.
///
/// `overflow_instances` is ordered oldest first; it only ever grows at the
/// tail or shrinks from the tail. `pool_members` maps an instance address to
/// the pool member this controller created for it — addresses registered by
/// anyone else never appear here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    #[serde(default)]
    pub overflow_instances: Vec<InstanceId>,
    #[serde(default)]
    pub pool_members: BTreeMap<String, MemberId>,
    #[serde(default)]
    pub last_adjustment: Option<CooldownStamp>,
}

impl GroupRecord {
    pub fn is_empty(&self) -> bool {
        self.overflow_instances.is_empty()
            && self.pool_members.is_empty()
            && self.last_adjustment.is_none()
    }
}
