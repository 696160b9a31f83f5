//! Load-balancer pool membership for scaling groups.
//!
//! Keeps a pool's membership converged with the set of live group
//! instances, and keeps the per-group address → member-id map in the state
//! store honest about which members this controller created.

pub mod error;
pub mod membership;

pub use error::{MembershipError, MembershipResult};
pub use membership::{PoolMembership, RefreshStats};
