//! Compute capability: server create/terminate/describe in one region.

use crate::error::CloudResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spillway_core::{InstanceId, LaunchTemplate};

/// Network attachment for a newly launched instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceSpec {
    pub subnet_id: String,
    #[serde(default)]
    pub security_groups: Vec<String>,
    /// Ask the provider for a routable address on the primary interface.
    #[serde(default)]
    pub associate_public_ip: bool,
}

/// Everything a backend needs to boot one batch of identical instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub image: String,
    pub flavor: String,
    pub key_name: Option<String>,
    pub user_data: Option<String>,
    pub network: NetworkInterfaceSpec,
}

impl LaunchRequest {
    /// Bind a launch template to a subnet, producing a concrete request.
    pub fn from_template(template: &LaunchTemplate, subnet_id: &str) -> Self {
        LaunchRequest {
            image: template.image.clone(),
            flavor: template.flavor.clone(),
            key_name: template.key_name.clone(),
            user_data: template.user_data.clone(),
            network: NetworkInterfaceSpec {
                subnet_id: subnet_id.to_string(),
                security_groups: template.security_groups.clone(),
                associate_public_ip: true,
            },
        }
    }
}

/// Provider-reported lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
}

/// Point-in-time view of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub id: InstanceId,
    pub status: InstanceStatus,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
}

impl InstanceInfo {
    /// The address other systems should reach this instance at: the public
    /// address when one exists, the private address otherwise.
    pub fn preferred_address(&self) -> Option<&str> {
        self.public_ip.as_deref().or(self.private_ip.as_deref())
    }

    pub fn is_running(&self) -> bool {
        self.status == InstanceStatus::Running
    }
}

/// Server operations in a single region.
///
/// A batch create may legitimately return fewer ids than asked for; callers
/// own every id that comes back regardless.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Launch up to `count` instances, returning their ids in creation order.
    async fn create_instances(
        &self,
        request: &LaunchRequest,
        count: u32,
    ) -> CloudResult<Vec<InstanceId>>;

    /// Terminate the given instances. Unknown ids are a backend error.
    async fn terminate_instances(&self, ids: &[InstanceId]) -> CloudResult<()>;

    /// Current state of one instance.
    async fn describe_instance(&self, id: &InstanceId) -> CloudResult<InstanceInfo>;
}
