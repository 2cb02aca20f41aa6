//! Stability metrics derived from a window of measurements.
//!
//! Everything here is a pure function of the window; nothing is cached.

use serde::{Deserialize, Serialize};

use crate::measurement::Measurement;

/// Aggregates over one window of measurements
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    /// Rounded mean latency of successful samples
    pub avg_latency: Option<u64>,
    /// Rounded population standard deviation of successful latencies
    pub jitter: Option<u64>,
    /// Percentage of successful samples, `0.0..=100.0`
    pub success_rate: f64,
    /// Failed samples in the window
    pub recent_error_count: usize,
    /// Timestamp of the most recent successful sample
    pub last_success_timestamp: Option<i64>,
}

/// Compute metrics over `window`, which must be in append order
pub fn calculate_metrics(window: &[Measurement]) -> DerivedMetrics {
    if window.is_empty() {
        return DerivedMetrics::default();
    }

    let total = window.len();
    let success_count = window.iter().filter(|m| m.success).count();
    let recent_error_count = total - success_count;
    let success_rate = success_count as f64 * 100.0 / total as f64;

    let latencies: Vec<u64> =
        window.iter().filter(|m| m.has_latency_sample()).filter_map(|m| m.latency).collect();

    let avg_latency = mean(&latencies).map(|avg| avg.round() as u64);

    let jitter = match avg_latency {
        Some(avg) if latencies.len() >= 2 => {
            let avg = avg as f64;
            let variance = latencies
                .iter()
                .map(|&latency| {
                    let delta = latency as f64 - avg;
                    delta * delta
                })
                .sum::<f64>()
                / latencies.len() as f64;
            Some(variance.sqrt().round() as u64)
        }
        _ => None,
    };

    let last_success_timestamp =
        window.iter().rev().find(|m| m.has_latency_sample()).map(|m| m.timestamp);

    DerivedMetrics {
        avg_latency,
        jitter,
        success_rate,
        recent_error_count,
        last_success_timestamp,
    }
}

fn mean(values: &[u64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::FailureCategory;

    fn failed(ts: i64) -> Measurement {
        Measurement::failure(ts, FailureCategory::NetworkError, "down")
    }

    #[test]
    fn test_empty_window() {
        let metrics = calculate_metrics(&[]);
        assert_eq!(metrics.success_rate, 0.0);
        assert_eq!(metrics.avg_latency, None);
        assert_eq!(metrics.jitter, None);
        assert_eq!(metrics.recent_error_count, 0);
        assert_eq!(metrics.last_success_timestamp, None);
    }

    #[test]
    fn test_mixed_window() {
        let latencies = [50, 60, 55, 65, 58, 62, 59];
        let mut window: Vec<Measurement> = latencies
            .iter()
            .enumerate()
            .map(|(i, &lat)| Measurement::success(i as i64, lat))
            .collect();
        window.extend((7..10).map(failed));

        let metrics = calculate_metrics(&window);
        assert_eq!(metrics.success_rate, 70.0);
        assert_eq!(metrics.avg_latency, Some(58));
        assert_eq!(metrics.recent_error_count, 3);
        // Squared deviations from 58 sum to 143; sqrt(143 / 7) rounds to 5
        assert_eq!(metrics.jitter, Some(5));
        assert_eq!(metrics.last_success_timestamp, Some(6));
    }

    #[test]
    fn test_single_success_has_no_jitter() {
        let metrics = calculate_metrics(&[Measurement::success(1, 80), failed(2)]);
        assert_eq!(metrics.avg_latency, Some(80));
        assert_eq!(metrics.jitter, None);
        assert_eq!(metrics.success_rate, 50.0);
    }

    #[test]
    fn test_all_failures() {
        let metrics = calculate_metrics(&[failed(1), failed(2)]);
        assert_eq!(metrics.success_rate, 0.0);
        assert_eq!(metrics.avg_latency, None);
        assert_eq!(metrics.recent_error_count, 2);
        assert_eq!(metrics.last_success_timestamp, None);
    }

    #[test]
    fn test_constant_latency_has_zero_jitter() {
        let window: Vec<_> = (0..5).map(|ts| Measurement::success(ts, 120)).collect();
        assert_eq!(calculate_metrics(&window).jitter, Some(0));
    }

    #[test]
    fn test_last_success_follows_window_order() {
        let window = vec![Measurement::success(500, 10), failed(600), Measurement::success(700, 20)];
        assert_eq!(calculate_metrics(&window).last_success_timestamp, Some(700));
    }
}
