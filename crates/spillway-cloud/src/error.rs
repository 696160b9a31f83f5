//! Error types for cloud capability calls.

use spillway_core::{InstanceId, MemberId};
use thiserror::Error;

/// Result type alias for cloud capability operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors surfaced by the compute, load-balancer, quota, and template
/// backends.
#[derive(Debug, Clone, Error)]
pub enum CloudError {
    #[error("instance not found: {0}")]
    InstanceNotFound(InstanceId),

    #[error("pool not found: {0}")]
    PoolNotFound(String),

    #[error("pool member not found: {0}")]
    MemberNotFound(MemberId),

    #[error("{api} request failed: {message}")]
    Api { api: &'static str, message: String },
}

impl CloudError {
    pub fn api(api: &'static str, message: impl Into<String>) -> Self {
        CloudError::Api {
            api,
            message: message.into(),
        }
    }
}
