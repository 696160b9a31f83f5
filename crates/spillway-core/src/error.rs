//! Group-definition validation errors.

use thiserror::Error;

/// A configuration problem that blocks group create/update. Never retried;
/// the definition has to change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("exactly one of launch_template and instance_id must be set")]
    AmbiguousSource,
    #[error("min_size {min} exceeds max_size {max}")]
    BoundsInverted { min: u32, max: u32 },
    #[error("desired_capacity {desired} outside [{min}, {max}]")]
    DesiredOutOfBounds { desired: u32, min: u32, max: u32 },
}
