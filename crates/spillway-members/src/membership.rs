//! PoolMembership — self-healing registration of group instances in one
//! load-balancer pool.
//!
//! The pool is shared, externally mutable state, so every decision starts
//! from a fresh member listing. Registration of an address someone else
//! already put in the pool is a silent no-op that records nothing; the map
//! in the state store only ever names members this controller created.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use spillway_cloud::{CloudError, LbApi};
use spillway_state::GroupStore;

use crate::error::{MembershipError, MembershipResult};

/// Counters for one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub registered: u32,
    pub removed: u32,
}

/// One group's view of one load-balancer pool.
pub struct PoolMembership {
    lb: Arc<dyn LbApi>,
    store: GroupStore,
    group: String,
    pool_id: String,
    port: u16,
}

impl PoolMembership {
    pub fn new(
        lb: Arc<dyn LbApi>,
        store: GroupStore,
        group: &str,
        pool_id: &str,
        port: u16,
    ) -> Self {
        PoolMembership {
            lb,
            store,
            group: group.to_string(),
            pool_id: pool_id.to_string(),
            port,
        }
    }

    /// Register `address` in the pool unless it is already there.
    ///
    /// Returns true if a member was created. An address already present in
    /// the fresh listing is left alone and not recorded, whoever put it
    /// there.
    pub async fn register(&self, address: &str) -> MembershipResult<bool> {
        let members = self.lb.list_pool_members(&self.pool_id).await?;
        if members.iter().any(|m| m.address == address) {
            debug!(
                group = %self.group,
                %address,
                "address already in pool, skipping registration"
            );
            return Ok(false);
        }
        let member_id = self
            .lb
            .create_pool_member(&self.pool_id, address, self.port)
            .await?;
        self.store
            .insert_pool_member(&self.group, address, &member_id)?;
        debug!(group = %self.group, %address, %member_id, "pool member registered");
        Ok(true)
    }

    /// Remove the member this controller created for `address`.
    ///
    /// The recorded mapping is authoritative: if there is none, the call
    /// fails loudly rather than deleting a member it cannot account for. A
    /// member that is already gone from the pool is tolerated — the mapping
    /// was the stale part.
    pub async fn deregister(&self, address: &str) -> MembershipResult<()> {
        let Some(member_id) = self.store.remove_pool_member(&self.group, address)? else {
            error!(
                group = %self.group,
                %address,
                "no recorded pool member for address, refusing to guess"
            );
            return Err(MembershipError::NotFound(address.to_string()));
        };
        match self.lb.delete_pool_member(&member_id).await {
            Ok(()) => {
                debug!(group = %self.group, %address, %member_id, "pool member removed");
                Ok(())
            }
            Err(CloudError::MemberNotFound(_)) => {
                warn!(
                    group = %self.group,
                    %address,
                    %member_id,
                    "recorded pool member already gone"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Converge the pool onto `live`: register every live address, then
    /// deregister every pool address that is not live.
    ///
    /// Running this twice with the same topology performs zero pool
    /// mutations the second time, which is what makes it safe to run after
    /// every resize as repair for earlier partial failures.
    pub async fn refresh(&self, live: &[String]) -> MembershipResult<RefreshStats> {
        let mut stats = RefreshStats::default();
        for address in live {
            if self.register(address).await? {
                stats.registered += 1;
            }
        }
        let members = self.lb.list_pool_members(&self.pool_id).await?;
        for member in &members {
            if !live.contains(&member.address) {
                self.deregister(&member.address).await?;
                stats.removed += 1;
            }
        }
        info!(
            group = %self.group,
            pool = %self.pool_id,
            live = live.len(),
            registered = stats.registered,
            removed = stats.removed,
            "pool membership refreshed"
        );
        Ok(stats)
    }

    /// Deregister every member this controller still has recorded.
    ///
    /// Used on group teardown, after the per-instance cleanup has run, to
    /// sweep whatever is left in the map. Returns how many members were
    /// removed.
    pub async fn deregister_all(&self) -> MembershipResult<u32> {
        let mapped = self.store.pool_members(&self.group)?;
        for address in mapped.keys() {
            self.deregister(address).await?;
        }
        if !mapped.is_empty() {
            info!(
                group = %self.group,
                pool = %self.pool_id,
                removed = mapped.len(),
                "swept remaining pool members"
            );
        }
        Ok(mapped.len() as u32)
    }

    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }
}
