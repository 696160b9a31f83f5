//! Capability traits the autoscaling controller consumes, and the types
//! that cross them.
//!
//! The controller never talks to a cloud SDK directly. Everything it needs
//! from the outside world comes through four narrow traits — [`ComputeApi`]
//! for the overflow region's servers, [`LbApi`] for the load-balancer pool,
//! [`QuotaApi`] for the home region's absolute limits, and
//! [`TemplateScaling`] for the host's same-region template mechanism — plus
//! the fire-and-forget [`Notifier`]. The [`sim`] module provides in-memory
//! implementations of all of them, used by the test suites and by
//! `spillwayd`.

pub mod compute;
pub mod error;
pub mod lbaas;
pub mod notify;
pub mod quota;
pub mod sim;
pub mod templates;

pub use compute::{ComputeApi, InstanceInfo, InstanceStatus, LaunchRequest, NetworkInterfaceSpec};
pub use error::{CloudError, CloudResult};
pub use lbaas::{LbApi, PoolMember};
pub use notify::{LogNotifier, Notifier, ScalingEvent, ScalingPhase};
pub use quota::{Limit, QuotaApi};
pub use templates::{TemplateMember, TemplateScaling};
