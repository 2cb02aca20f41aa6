use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Look-back window used to slice the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    OneDay,
}

impl TimeWindow {
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::FifteenMinutes => Duration::from_secs(15 * 60),
            TimeWindow::OneHour => Duration::from_secs(60 * 60),
            TimeWindow::OneDay => Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Oldest timestamp (ms) still inside the window ending at `now_ms`
    pub fn cutoff(&self, now_ms: i64) -> i64 {
        now_ms - self.duration().as_millis() as i64
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::FifteenMinutes => "15m",
            TimeWindow::OneHour => "1h",
            TimeWindow::OneDay => "24h",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "15m" => Ok(TimeWindow::FifteenMinutes),
            "1h" => Ok(TimeWindow::OneHour),
            "24h" => Ok(TimeWindow::OneDay),
            other => Err(format!("unknown time window: {other} (expected 15m, 1h or 24h)")),
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff() {
        let now = 10_000_000;
        assert_eq!(TimeWindow::FifteenMinutes.cutoff(now), now - 900_000);
        assert_eq!(TimeWindow::OneHour.cutoff(now), now - 3_600_000);
        assert_eq!(TimeWindow::OneDay.cutoff(now), now - 86_400_000);
    }

    #[test]
    fn test_parse_and_display() {
        for window in [TimeWindow::FifteenMinutes, TimeWindow::OneHour, TimeWindow::OneDay] {
            assert_eq!(window.to_string().parse::<TimeWindow>().unwrap(), window);
        }
        assert!("2d".parse::<TimeWindow>().is_err());
    }
}
