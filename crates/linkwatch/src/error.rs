//! Error types shared across the engine.
//!
//! Probe failures are not errors: they are carried as data in
//! [`ProbeOutcome`](crate::probe::ProbeOutcome). The types here cover the
//! seams where something outside the engine can actually fail.

use thiserror::Error;

/// Failure reported by a [`Reachability`](crate::probe::Reachability) transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// Ordinary transport failure (connection refused, DNS, reset, ...)
    #[error("{0}")]
    Network(String),
    /// Anything the transport could not attribute to the network
    #[error("{0}")]
    Other(String),
}

/// Failure reported by a [`MeasurementSink`](crate::sink::MeasurementSink)
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Failure talking to a running engine
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("monitor engine has stopped")]
    Stopped,
}
