use serde::{Deserialize, Serialize};

use crate::metrics::DerivedMetrics;

/// Success rate (percent) below which a link counts as degraded
pub const DEGRADED_SUCCESS_RATE: f64 = 70.0;

/// Mean latency (ms) above which a link counts as degraded
pub const DEGRADED_LATENCY_MS: u64 = 1000;

/// Coarse connectivity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StabilityStatus {
    Stable,
    Degraded,
    Offline,
}

impl std::fmt::Display for StabilityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StabilityStatus::Stable => write!(f, "Stable"),
            StabilityStatus::Degraded => write!(f, "Degraded"),
            StabilityStatus::Offline => write!(f, "Offline"),
        }
    }
}

/// Classify the link from its metrics and the liveness signal
pub fn classify(metrics: &DerivedMetrics, is_online: bool) -> StabilityStatus {
    if !is_online || metrics.success_rate == 0.0 {
        return StabilityStatus::Offline;
    }

    let slow = metrics.avg_latency.is_some_and(|avg| avg > DEGRADED_LATENCY_MS);
    if metrics.success_rate < DEGRADED_SUCCESS_RATE || slow {
        return StabilityStatus::Degraded;
    }

    StabilityStatus::Stable
}
