use serde::{Deserialize, Serialize};

use crate::probe::ProbeOutcome;

/// Category of a failed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    #[serde(rename = "Timeout")]
    Timeout,
    #[serde(rename = "Network Error")]
    NetworkError,
    #[serde(rename = "Unknown Error")]
    UnknownError,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Timeout => "Timeout",
            FailureCategory::NetworkError => "Network Error",
            FailureCategory::UnknownError => "Unknown Error",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded outcome of one probe attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// Completion time in milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Round-trip time in milliseconds, present on success
    pub latency: Option<u64>,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<FailureCategory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Measurement {
    /// Successful measurement with latency
    pub fn success(timestamp: i64, latency_ms: u64) -> Self {
        Self {
            timestamp,
            latency: Some(latency_ms),
            success: true,
            error_category: None,
            error_message: None,
        }
    }

    /// Failed measurement with its category and message
    pub fn failure(timestamp: i64, category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            latency: None,
            success: false,
            error_category: Some(category),
            error_message: Some(message.into()),
        }
    }

    /// Build the measurement for a completed probe
    pub fn from_outcome(timestamp: i64, outcome: &ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Reachable { latency_ms } => Self::success(timestamp, *latency_ms),
            ProbeOutcome::Failed(failure) => {
                Self::failure(timestamp, failure.category, failure.message.clone())
            }
        }
    }

    /// Successful and carrying a latency, the set metrics aggregate over
    pub fn has_latency_sample(&self) -> bool {
        self.success && self.latency.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeFailure;

    #[test]
    fn test_category_serializes_as_display_name() {
        let json = serde_json::to_string(&FailureCategory::NetworkError).unwrap();
        assert_eq!(json, "\"Network Error\"");

        let parsed: FailureCategory = serde_json::from_str("\"Unknown Error\"").unwrap();
        assert_eq!(parsed, FailureCategory::UnknownError);
    }

    #[test]
    fn test_from_outcome() {
        let ok = Measurement::from_outcome(10, &ProbeOutcome::Reachable { latency_ms: 42 });
        assert!(ok.success);
        assert_eq!(ok.latency, Some(42));
        assert!(ok.error_category.is_none());

        let failed = Measurement::from_outcome(
            11,
            &ProbeOutcome::Failed(ProbeFailure::timeout(5000)),
        );
        assert!(!failed.success);
        assert_eq!(failed.latency, None);
        assert_eq!(failed.error_category, Some(FailureCategory::Timeout));
        assert_eq!(failed.error_message.as_deref(), Some("Request timed out after 5000ms"));
    }

    #[test]
    fn test_json_field_names() {
        let m = Measurement::failure(1, FailureCategory::Timeout, "slow");
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["errorCategory"], "Timeout");
        assert_eq!(value["errorMessage"], "slow");
        assert!(value["latency"].is_null());
    }
}
