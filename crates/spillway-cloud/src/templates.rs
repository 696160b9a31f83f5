//! Template-scaling capability: the host's same-region scaling mechanism.
//!
//! In the home region the group does not launch servers itself; it asks the
//! enclosing orchestration to re-issue its member-template set at a new
//! count. Rendering, batching per the rolling-update policy, and replacement
//! of failed members all happen behind this trait.

use crate::error::CloudResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spillway_core::InstanceId;

/// One home-region group member as the template mechanism reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMember {
    pub id: InstanceId,
    /// Reachable address, once the member has one.
    pub address: Option<String>,
}

/// Count-addressed scaling of the home-region member set.
#[async_trait]
pub trait TemplateScaling: Send + Sync {
    /// Re-issue the member-template set at exactly `count` members.
    async fn create_or_replace_templates(&self, count: u32) -> CloudResult<()>;

    /// Current non-failed members, in creation order.
    async fn members(&self) -> CloudResult<Vec<TemplateMember>>;

    /// Whether the last create/update of the member set has settled.
    async fn ready(&self) -> CloudResult<bool>;
}
