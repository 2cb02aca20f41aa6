//! Tracing setup shared by the linkwatch binaries.
//!
//! The filter comes from `RUST_LOG` (default `info`). Setting
//! `RUST_LOG_FORMAT=json` switches to line-delimited JSON output, which is
//! what the service uses when its logs are shipped somewhere.

use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer, Registry, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Output format of the log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// Read `RUST_LOG_FORMAT`, defaulting to compact output
    pub fn from_env() -> Self {
        let raw = var("RUST_LOG_FORMAT").unwrap_or_default();
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Initialize tracing at `info` unless `RUST_LOG` says otherwise
pub fn init_tracing() {
    init_with_level(LevelFilter::INFO);
}

/// Initialize tracing with `level` as the default directive.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_with_level(level: LevelFilter) {
    let format = LogFormat::from_env();
    if tracing_subscriber::registry().with(log_layer(level, format)).try_init().is_err() {
        warn!("Tracing subscriber already installed, keeping the existing one");
    }
}

fn log_layer(level: LevelFilter, format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse(""), LogFormat::Compact);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Compact);
    }

    #[test]
    fn test_double_init_is_harmless() {
        init_with_level(LevelFilter::DEBUG);
        init_with_level(LevelFilter::INFO);
    }
}
