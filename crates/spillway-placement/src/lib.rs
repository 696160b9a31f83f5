//! Region placement for scaling groups.
//!
//! A group's regions are modeled as an ordered list of [`RegionTarget`]s.
//! The default pair is the home region, which scales through the host's
//! template mechanism and is gated on quota headroom, and the overflow
//! region, which provisions servers directly and takes whatever the home
//! region cannot.

pub mod error;
pub mod headroom;
pub mod home;
pub mod overflow;
pub mod target;

pub use error::{PlacementError, PlacementResult};
pub use headroom::home_region_headroom;
pub use home::HomeRegion;
pub use overflow::{BootTuning, OverflowRegion};
pub use target::RegionTarget;
