/// Probe module - one reachability check with a deadline
///
/// A probe never fails: every attempt ends in a [`ProbeOutcome`], either a
/// measured latency or one categorized failure. Retrying is the scheduler's
/// job, not the probe's.
pub mod transport;

pub use transport::{HttpReachability, Reachability, TcpReachability};

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, Instant};
use tracing::debug;

use crate::error::TransportError;
use crate::measurement::FailureCategory;

/// Why a probe failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub category: FailureCategory,
    pub message: String,
}

impl ProbeFailure {
    pub fn timeout(timeout_ms: u64) -> Self {
        Self {
            category: FailureCategory::Timeout,
            message: format!("Request timed out after {timeout_ms}ms"),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self { category: FailureCategory::NetworkError, message: message.into() }
    }

    pub fn unknown() -> Self {
        Self {
            category: FailureCategory::UnknownError,
            message: "An unknown error occurred".to_string(),
        }
    }
}

/// Result of one probe attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable { latency_ms: u64 },
    Failed(ProbeFailure),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable { .. })
    }
}

/// Runs reachability checks against a transport
#[derive(Clone)]
pub struct Probe {
    transport: Arc<dyn Reachability>,
}

impl Probe {
    pub fn new(transport: Arc<dyn Reachability>) -> Self {
        Self { transport }
    }

    /// Perform one check, bounded by `timeout_ms`
    pub async fn run(&self, timeout_ms: u64) -> ProbeOutcome {
        let transport = Arc::clone(&self.transport);
        let start = Instant::now();

        // Run the transport in its own task so a panicking implementation
        // still yields an outcome.
        let mut attempt = AbortOnDrop(tokio::spawn(async move { transport.reach().await }));

        let outcome = match timeout(Duration::from_millis(timeout_ms), &mut attempt.0).await {
            Err(_elapsed) => ProbeOutcome::Failed(ProbeFailure::timeout(timeout_ms)),
            Ok(Ok(Ok(()))) => {
                let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
                ProbeOutcome::Reachable { latency_ms: latency_ms.round() as u64 }
            }
            Ok(Ok(Err(TransportError::Network(message)))) => {
                ProbeOutcome::Failed(ProbeFailure::network(message))
            }
            Ok(Ok(Err(TransportError::Other(message)))) => {
                debug!(%message, "Transport reported a non-network failure");
                ProbeOutcome::Failed(ProbeFailure::unknown())
            }
            Ok(Err(join_error)) => {
                debug!(error = %join_error, "Transport task did not complete");
                ProbeOutcome::Failed(ProbeFailure::unknown())
            }
        };

        debug!(probe_target = self.transport.target(), ?outcome, "Probe finished");
        outcome
    }
}

/// Stops the transport task when the probe finishes or is itself aborted
struct AbortOnDrop<T>(tokio::task::JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(fn() -> Result<(), TransportError>);

    #[async_trait::async_trait]
    impl Reachability for Scripted {
        async fn reach(&self) -> Result<(), TransportError> {
            (self.0)()
        }

        fn target(&self) -> &str {
            "scripted"
        }
    }

    struct Slow;

    #[async_trait::async_trait]
    impl Reachability for Slow {
        async fn reach(&self) -> Result<(), TransportError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        fn target(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_reachable() {
        let probe = Probe::new(Arc::new(Scripted(|| Ok(()))));
        assert!(probe.run(1000).await.is_success());
    }

    #[tokio::test]
    async fn test_network_error_keeps_message() {
        let probe =
            Probe::new(Arc::new(Scripted(|| Err(TransportError::Network("refused".into())))));
        let outcome = probe.run(1000).await;
        assert_eq!(outcome, ProbeOutcome::Failed(ProbeFailure::network("refused")));
    }

    #[tokio::test]
    async fn test_other_error_is_unknown() {
        let probe = Probe::new(Arc::new(Scripted(|| Err(TransportError::Other("odd".into())))));
        assert_eq!(probe.run(1000).await, ProbeOutcome::Failed(ProbeFailure::unknown()));
    }

    #[tokio::test]
    async fn test_panicking_transport_is_unknown() {
        let probe = Probe::new(Arc::new(Scripted(|| panic!("transport bug"))));
        assert_eq!(probe.run(1000).await, ProbeOutcome::Failed(ProbeFailure::unknown()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_timeout() {
        let probe = Probe::new(Arc::new(Slow));
        let outcome = probe.run(2500).await;
        match outcome {
            ProbeOutcome::Failed(failure) => {
                assert_eq!(failure.category, FailureCategory::Timeout);
                assert_eq!(failure.message, "Request timed out after 2500ms");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
