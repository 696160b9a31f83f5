//! Home-region quota headroom oracle.

use spillway_cloud::quota::{Limit, QuotaApi, limits};
use tracing::debug;

use crate::error::{PlacementError, PlacementResult};

/// (max, used) metric pairs the oracle requires.
const METRICS: [(&str, &str); 3] = [
    (limits::MAX_INSTANCES, limits::INSTANCES_USED),
    (limits::MAX_CORES, limits::CORES_USED),
    (limits::MAX_RAM, limits::RAM_USED),
];

/// True when the home region can still fit at least one more instance on
/// every quota axis: instances, cores, and RAM.
///
/// Negative reported values mean unlimited, except on the used counters,
/// where they are clamped to zero. A metric missing from the response makes
/// the whole response malformed; callers treat the error as no headroom.
pub async fn home_region_headroom(quota: &dyn QuotaApi) -> PlacementResult<bool> {
    let snapshot = quota
        .absolute_limits()
        .await
        .map_err(|e| PlacementError::QuotaQuery(e.to_string()))?;
    for (max_name, used_name) in METRICS {
        let max = metric(&snapshot, max_name)?;
        let used = metric(&snapshot, used_name)?;
        if max.saturating_sub(used) <= 0 {
            debug!(metric = max_name, max, used, "home region quota exhausted");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Look up one metric by name, normalizing negative values.
fn metric(snapshot: &[Limit], name: &str) -> PlacementResult<i64> {
    let limit = snapshot
        .iter()
        .find(|l| l.name == name)
        .ok_or_else(|| PlacementError::QuotaQuery(format!("metric {name} missing from limits")))?;
    if limit.value >= 0 {
        return Ok(limit.value);
    }
    if name.starts_with("total") && name.ends_with("Used") {
        Ok(0)
    } else {
        Ok(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spillway_cloud::sim::SimQuota;

    #[tokio::test]
    async fn roomy_limits_have_headroom() {
        let quota = SimQuota::roomy();
        assert!(home_region_headroom(&quota).await.unwrap());
    }

    #[tokio::test]
    async fn exhausted_instances_deny_headroom() {
        let quota = SimQuota::exhausted();
        assert!(!home_region_headroom(&quota).await.unwrap());
    }

    #[tokio::test]
    async fn any_single_exhausted_metric_denies_headroom() {
        let quota = SimQuota::with_limits(vec![
            Limit::new(limits::MAX_INSTANCES, 10),
            Limit::new(limits::INSTANCES_USED, 3),
            Limit::new(limits::MAX_CORES, 8),
            Limit::new(limits::CORES_USED, 8),
            Limit::new(limits::MAX_RAM, 51200),
            Limit::new(limits::RAM_USED, 1024),
        ]);
        assert!(!home_region_headroom(&quota).await.unwrap());
    }

    #[tokio::test]
    async fn negative_maxima_mean_unlimited() {
        let quota = SimQuota::unlimited();
        assert!(home_region_headroom(&quota).await.unwrap());
    }

    #[tokio::test]
    async fn negative_used_counter_counts_as_zero() {
        let quota = SimQuota::with_limits(vec![
            Limit::new(limits::MAX_INSTANCES, 1),
            Limit::new(limits::INSTANCES_USED, -3),
            Limit::new(limits::MAX_CORES, 2),
            Limit::new(limits::CORES_USED, 0),
            Limit::new(limits::MAX_RAM, 512),
            Limit::new(limits::RAM_USED, 0),
        ]);
        assert!(home_region_headroom(&quota).await.unwrap());
    }

    #[tokio::test]
    async fn missing_metric_is_a_query_error() {
        let quota = SimQuota::with_limits(vec![
            Limit::new(limits::MAX_INSTANCES, 10),
            Limit::new(limits::INSTANCES_USED, 0),
        ]);
        let err = home_region_headroom(&quota).await.unwrap_err();
        assert!(matches!(err, PlacementError::QuotaQuery(_)));
    }

    #[tokio::test]
    async fn failed_query_is_a_query_error() {
        let quota = SimQuota::failing("compute api unreachable");
        let err = home_region_headroom(&quota).await.unwrap_err();
        assert!(matches!(err, PlacementError::QuotaQuery(_)));
    }
}
