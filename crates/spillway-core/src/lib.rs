//! Core types for the spillway autoscaling controller: scaling-group
//! definitions, validation, and capacity arithmetic.

pub mod capacity;
pub mod config;
pub mod error;
pub mod types;

pub use capacity::new_capacity;
pub use config::GroupsFile;
pub use error::ValidationError;
pub use types::*;
