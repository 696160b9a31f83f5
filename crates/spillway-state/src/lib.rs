//! Embedded per-group bookkeeping for the spillway controller, backed by
//! redb. Holds the overflow-region instance list, the pool-member map, and
//! the cooldown stamp for each scaling group.

pub mod error;
pub mod store;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::GroupStore;
pub use types::{CooldownStamp, GroupRecord};
