//! Quota capability: the home region's absolute limits.

use crate::error::CloudResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One named limit as the compute service reports it. Negative values mean
/// unlimited; the interpretation lives in the headroom oracle, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub name: String,
    pub value: i64,
}

impl Limit {
    pub fn new(name: &str, value: i64) -> Self {
        Limit {
            name: name.to_string(),
            value,
        }
    }
}

/// Limit names as the compute service spells them.
pub mod limits {
    pub const MAX_INSTANCES: &str = "maxTotalInstances";
    pub const INSTANCES_USED: &str = "totalInstancesUsed";
    pub const MAX_CORES: &str = "maxTotalCores";
    pub const CORES_USED: &str = "totalCoresUsed";
    pub const MAX_RAM: &str = "maxTotalRAMSize";
    pub const RAM_USED: &str = "totalRAMUsed";
}

/// Read access to the home region's absolute limits.
///
/// The numbers are a best-effort snapshot, not a reservation; capacity can
/// be consumed by other tenants between the query and any create that
/// relies on it.
#[async_trait]
pub trait QuotaApi: Send + Sync {
    async fn absolute_limits(&self) -> CloudResult<Vec<Limit>>;
}
