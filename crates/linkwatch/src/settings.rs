//! Monitoring settings and their bounds.
//!
//! Every write goes through [`SettingField::clamp`]: out-of-range input is
//! coerced into bounds, never rejected.

use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Inclusive bounds and default of one setting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

/// Names of the tunable settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingField {
    Interval,
    Timeout,
    MaxRetries,
    BackoffBaseDelay,
    BackoffMultiplier,
}

impl SettingField {
    pub const ALL: [SettingField; 5] = [
        SettingField::Interval,
        SettingField::Timeout,
        SettingField::MaxRetries,
        SettingField::BackoffBaseDelay,
        SettingField::BackoffMultiplier,
    ];

    pub fn bounds(&self) -> Bounds {
        match self {
            SettingField::Interval => Bounds { min: 5.0, max: 300.0, default: 30.0 },
            SettingField::Timeout => Bounds { min: 1000.0, max: 30000.0, default: 5000.0 },
            SettingField::MaxRetries => Bounds { min: 0.0, max: 10.0, default: 3.0 },
            SettingField::BackoffBaseDelay => Bounds { min: 100.0, max: 10000.0, default: 1000.0 },
            SettingField::BackoffMultiplier => Bounds { min: 1.0, max: 5.0, default: 2.0 },
        }
    }

    fn is_integral(&self) -> bool {
        !matches!(self, SettingField::BackoffMultiplier)
    }

    /// Coerce a raw value into this field's bounds.
    ///
    /// NaN falls back to the default; integer fields are rounded.
    pub fn clamp(&self, raw: f64) -> f64 {
        let bounds = self.bounds();
        if raw.is_nan() {
            return bounds.default;
        }
        let clamped = raw.clamp(bounds.min, bounds.max);
        if self.is_integral() { clamped.round() } else { clamped }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingField::Interval => "interval",
            SettingField::Timeout => "timeout",
            SettingField::MaxRetries => "max_retries",
            SettingField::BackoffBaseDelay => "backoff_base_delay",
            SettingField::BackoffMultiplier => "backoff_multiplier",
        }
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String =
            s.chars().filter(|c| *c != '_' && *c != '-').collect::<String>().to_lowercase();
        match normalized.as_str() {
            "interval" => Ok(SettingField::Interval),
            "timeout" => Ok(SettingField::Timeout),
            "maxretries" => Ok(SettingField::MaxRetries),
            "backoffbasedelay" => Ok(SettingField::BackoffBaseDelay),
            "backoffmultiplier" => Ok(SettingField::BackoffMultiplier),
            _ => Err(format!("unknown setting: {s}")),
        }
    }
}

/// Snapshot of the monitoring settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between periodic checks
    pub interval: u64,
    /// Probe deadline in milliseconds
    pub timeout: u64,
    /// Retries after a failed check before waiting for the next tick
    pub max_retries: u32,
    /// First retry delay in milliseconds
    pub backoff_base_delay: u64,
    /// Growth factor applied per retry
    pub backoff_multiplier: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: 30,
            timeout: 5000,
            max_retries: 3,
            backoff_base_delay: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Settings {
    pub fn get(&self, field: SettingField) -> f64 {
        match field {
            SettingField::Interval => self.interval as f64,
            SettingField::Timeout => self.timeout as f64,
            SettingField::MaxRetries => self.max_retries as f64,
            SettingField::BackoffBaseDelay => self.backoff_base_delay as f64,
            SettingField::BackoffMultiplier => self.backoff_multiplier,
        }
    }

    /// Clamp `raw` and store it, returning the effective value
    pub fn set(&mut self, field: SettingField, raw: f64) -> f64 {
        let value = field.clamp(raw);
        match field {
            SettingField::Interval => self.interval = value as u64,
            SettingField::Timeout => self.timeout = value as u64,
            SettingField::MaxRetries => self.max_retries = value as u32,
            SettingField::BackoffBaseDelay => self.backoff_base_delay = value as u64,
            SettingField::BackoffMultiplier => self.backoff_multiplier = value,
        }
        value
    }

    /// Copy with every field coerced into bounds
    pub fn clamped(mut self) -> Self {
        for field in SettingField::ALL {
            let raw = self.get(field);
            self.set(field, raw);
        }
        self
    }

    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Delay before the retry that follows `retry_count` earlier retries
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        let millis = self.backoff_base_delay as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis.round() as u64)
    }
}

/// Source of the settings snapshot consumed by the engine
pub trait SettingsProvider: Send + Sync {
    fn get(&self) -> Settings;

    /// Clamp and store one field, returning the effective value
    fn set(&self, field: SettingField, raw: f64) -> f64;

    /// Restore and return the defaults
    fn reset(&self) -> Settings;
}

/// Settings held in memory only
#[derive(Debug, Default)]
pub struct MemorySettings {
    inner: RwLock<Settings>,
}

impl MemorySettings {
    pub fn new(settings: Settings) -> Self {
        Self { inner: RwLock::new(settings.clamped()) }
    }
}

impl SettingsProvider for MemorySettings {
    fn get(&self) -> Settings {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set(&self, field: SettingField, raw: f64) -> f64 {
        self.inner.write().unwrap_or_else(|e| e.into_inner()).set(field, raw)
    }

    fn reset(&self) -> Settings {
        let defaults = Settings::default();
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = defaults;
        defaults
    }
}
