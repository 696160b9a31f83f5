//! Group-level scaling control.
//!
//! [`GroupController`] owns one scaling group: it turns adjustment requests
//! into bounded capacity targets, discards them during cooldown windows,
//! emits start/end/error notifications around each attempt, and drives the
//! lifecycle the host sees (create, update, readiness checks, delete). The
//! actual movement of capacity between regions is delegated to
//! [`Reconciler`], which picks one region target per resize and reconverges
//! the load-balancer pool afterwards.

pub mod controller;
pub mod error;
pub mod reconciler;

pub use controller::{AdjustOutcome, GroupController, GroupStatus, RegionStatus};
pub use error::{ControllerError, ControllerResult};
pub use reconciler::{CapacitySnapshot, Reconciler, ResizeReport};
