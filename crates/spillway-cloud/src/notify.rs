//! Scaling notifications.
//!
//! Fire-and-forget: a notification that fails to send must never fail the
//! adjustment that produced it, so the trait is infallible and synchronous.

use serde::{Deserialize, Serialize};
use spillway_core::AdjustmentType;
use tracing::{error, info};

/// Where in an adjustment's life the event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingPhase {
    Start,
    End,
    Error,
}

/// One adjustment lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingEvent {
    pub group: String,
    pub phase: ScalingPhase,
    pub adjustment: i64,
    pub adjustment_type: AdjustmentType,
    /// Capacity before the adjustment on start, after it on end.
    pub capacity: u32,
    pub message: String,
}

/// Sink for adjustment lifecycle events.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &ScalingEvent);
}

/// Default notifier: structured log lines, nothing else.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &ScalingEvent) {
        match event.phase {
            ScalingPhase::Start | ScalingPhase::End => info!(
                group = %event.group,
                phase = ?event.phase,
                adjustment = event.adjustment,
                capacity = event.capacity,
                "{}",
                event.message
            ),
            ScalingPhase::Error => error!(
                group = %event.group,
                adjustment = event.adjustment,
                capacity = event.capacity,
                "{}",
                event.message
            ),
        }
    }
}
