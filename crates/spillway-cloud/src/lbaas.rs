//! Load-balancer pool capability.

use crate::error::CloudResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spillway_core::MemberId;

/// One registered pool member as the load balancer reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMember {
    pub id: MemberId,
    pub address: String,
}

/// Pool membership operations.
///
/// The pool is shared, externally mutable state: anything may have
/// registered or removed members between two calls, so callers list fresh
/// before deciding anything.
#[async_trait]
pub trait LbApi: Send + Sync {
    /// Every member currently registered in the pool.
    async fn list_pool_members(&self, pool_id: &str) -> CloudResult<Vec<PoolMember>>;

    /// Register `address` in the pool, returning the new member's id.
    async fn create_pool_member(
        &self,
        pool_id: &str,
        address: &str,
        port: u16,
    ) -> CloudResult<MemberId>;

    /// Remove one member by id.
    async fn delete_pool_member(&self, member_id: &MemberId) -> CloudResult<()>;
}
