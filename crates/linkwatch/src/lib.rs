//! linkwatch - connectivity monitoring engine
//!
//! This library continuously probes network reachability, keeps a bounded
//! history of the results and classifies the connection as stable, degraded
//! or offline.
//!
//! The moving parts, leaf first:
//! - [`probe`]: one reachability check with a deadline, categorized outcome
//! - [`history`]: fixed-capacity ring of measurements
//! - [`metrics`]: pure aggregation over a window of measurements
//! - [`classifier`]: pure mapping from metrics + liveness to a status
//! - [`engine`]: the scheduler state machine and the task that owns all state

pub mod classifier;
pub mod engine;
pub mod error;
pub mod history;
pub mod measurement;
pub mod metrics;
pub mod probe;
pub mod settings;
pub mod sink;
pub mod timer;
pub mod window;

// Re-export main types
pub use classifier::{classify, StabilityStatus};
pub use engine::{Monitor, MonitorConfig, MonitorHandle, Notification, Report, SchedulerState};
pub use error::{EngineError, SinkError, TransportError};
pub use history::SampleHistory;
pub use measurement::{FailureCategory, Measurement};
pub use metrics::{calculate_metrics, DerivedMetrics};
pub use probe::{HttpReachability, Probe, ProbeFailure, ProbeOutcome, Reachability, TcpReachability};
pub use settings::{MemorySettings, SettingField, Settings, SettingsProvider};
pub use sink::{CheckIdGenerator, MeasurementRecord, MeasurementSink, ResultCode};
pub use window::TimeWindow;

/// Maximum number of measurements kept in memory
pub const HISTORY_CAPACITY: usize = 100;

/// Default reachability target for HTTP probes
pub const DEFAULT_PROBE_TARGET: &str = "https://www.google.com/favicon.ico";
