//! Capacity arithmetic for scaling adjustments.

use crate::types::AdjustmentType;
use tracing::debug;

/// Compute the capacity a group should move to for an adjustment request.
///
/// A percent adjustment that works out to less than one whole instance
/// rounds away from zero, so a small percentage always moves the group;
/// larger fractional deltas round toward zero. The arithmetic saturates,
/// so an extreme amount lands on the nearest bound; the result is clamped
/// to `[min, max]`.
pub fn new_capacity(current: u32, amount: i64, kind: AdjustmentType, min: u32, max: u32) -> u32 {
    let proposed = match kind {
        AdjustmentType::Exact => amount,
        AdjustmentType::Delta => i64::from(current).saturating_add(amount),
        AdjustmentType::Percent => {
            let delta = f64::from(current) * amount as f64 / 100.0;
            let rounded = if delta.abs() < 1.0 {
                if delta > 0.0 { delta.ceil() } else { delta.floor() }
            } else if delta > 0.0 {
                delta.floor()
            } else {
                delta.ceil()
            };
            i64::from(current).saturating_add(rounded as i64)
        }
    };
    if proposed > i64::from(max) {
        debug!(proposed, max, "truncating growth to max_size");
        return max;
    }
    if proposed < i64::from(min) {
        debug!(proposed, min, "truncating shrinkage to min_size");
        return min;
    }
    proposed as u32
}
