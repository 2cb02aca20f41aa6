//! Persistence sink contract.
//!
//! The engine records every measurement in memory first and then hands a
//! [`MeasurementRecord`] to the sink without waiting for it. A failing sink
//! never rolls back the in-memory history.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::measurement::{FailureCategory, Measurement};

const PASSED: &str = "Connectivity check passed";
const FAILED: &str = "Connectivity check failed";

/// Outcome code stored with each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultCode {
    Good,
    Bad,
}

/// Persisted form of a measurement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    pub check_id: u64,
    /// Nanoseconds since the Unix epoch
    pub timestamp_ns: u64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub result_code: ResultCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_time_ms: Option<u64>,
}

impl MeasurementRecord {
    pub fn from_measurement(measurement: &Measurement, check_id: u64) -> Self {
        let (description, result_code) = if measurement.success {
            (PASSED, ResultCode::Good)
        } else {
            (FAILED, ResultCode::Bad)
        };

        Self {
            check_id,
            timestamp_ns: u64::try_from(measurement.timestamp)
                .unwrap_or_default()
                .saturating_mul(1_000_000),
            description: description.to_string(),
            error_message: measurement.error_message.clone(),
            result_code,
            ping_time_ms: measurement.latency,
        }
    }

    /// Rebuild a measurement; the failure category is not stored and
    /// comes back as a network error.
    pub fn to_measurement(&self) -> Measurement {
        let success = self.result_code == ResultCode::Good;
        Measurement {
            timestamp: i64::try_from(self.timestamp_ns / 1_000_000).unwrap_or(i64::MAX),
            latency: self.ping_time_ms,
            success,
            error_category: (!success).then_some(FailureCategory::NetworkError),
            error_message: self.error_message.clone(),
        }
    }
}

/// Destination for measurements outside the engine
#[async_trait]
pub trait MeasurementSink: Send + Sync {
    /// Store one record
    async fn submit(&self, record: &MeasurementRecord) -> Result<(), SinkError>;

    /// Remove every stored record
    async fn clear(&self) -> Result<(), SinkError>;
}

/// Strictly increasing check ids, unique per engine instance
///
/// Seeded from the wall clock so ids keep growing across restarts.
#[derive(Debug)]
pub struct CheckIdGenerator {
    next: AtomicU64,
}

impl CheckIdGenerator {
    pub fn new(seed: u64) -> Self {
        Self { next: AtomicU64::new(seed) }
    }

    /// Seed with the current time in milliseconds
    pub fn from_clock() -> Self {
        Self::new(u64::try_from(crate::window::now_millis()).unwrap_or_default())
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_record() {
        let record = MeasurementRecord::from_measurement(&Measurement::success(1_700, 42), 7);
        assert_eq!(record.check_id, 7);
        assert_eq!(record.timestamp_ns, 1_700_000_000);
        assert_eq!(record.description, "Connectivity check passed");
        assert_eq!(record.result_code, ResultCode::Good);
        assert_eq!(record.ping_time_ms, Some(42));
        assert_eq!(record.error_message, None);
    }

    #[test]
    fn test_failure_record_restores_as_network_error() {
        let original =
            Measurement::failure(2_000, FailureCategory::Timeout, "Request timed out after 5000ms");
        let record = MeasurementRecord::from_measurement(&original, 1);
        assert_eq!(record.result_code, ResultCode::Bad);
        assert_eq!(record.description, "Connectivity check failed");

        let restored = record.to_measurement();
        assert_eq!(restored.timestamp, 2_000);
        assert!(!restored.success);
        assert_eq!(restored.error_category, Some(FailureCategory::NetworkError));
        assert_eq!(restored.error_message, original.error_message);
    }

    #[test]
    fn test_record_json_shape() {
        let record = MeasurementRecord::from_measurement(&Measurement::success(1, 5), 3);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["checkId"], 3);
        assert_eq!(value["resultCode"], "good");
        assert_eq!(value["pingTimeMs"], 5);
    }

    #[test]
    fn test_check_ids_increase() {
        let ids = CheckIdGenerator::new(1_000);
        let a = ids.next_id();
        let b = ids.next_id();
        assert_eq!(a, 1_000);
        assert!(b > a);
    }

    #[test]
    fn test_generators_do_not_share_state() {
        let first = CheckIdGenerator::from_clock();
        let second = CheckIdGenerator::from_clock();
        let a = first.next_id();
        first.next_id();
        // Each instance counts from its own seed
        assert!(second.next_id() >= a);
    }
}
