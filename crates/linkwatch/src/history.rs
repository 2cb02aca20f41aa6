//! Fixed-capacity sample history.
//!
//! Entries are kept in append order and the oldest entry is evicted when the
//! ring is full. Metrics rely on that order (the last successful entry is
//! the most recent one), so the history never re-sorts.

use std::collections::VecDeque;

use tracing::warn;

use crate::measurement::Measurement;
use crate::HISTORY_CAPACITY;

#[derive(Debug, Clone)]
pub struct SampleHistory {
    capacity: usize,
    samples: VecDeque<Measurement>,
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl SampleHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, samples: VecDeque::with_capacity(capacity) }
    }

    /// Append a measurement, evicting the oldest one on overflow
    pub fn append(&mut self, measurement: Measurement) {
        if let Some(last) = self.samples.back() {
            if measurement.timestamp < last.timestamp {
                // Still appended in arrival order; windows may then include
                // an entry older than its predecessor.
                warn!(
                    previous = last.timestamp,
                    incoming = measurement.timestamp,
                    "Measurement appended out of chronological order"
                );
            }
        }

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(measurement);
    }

    /// Measurements with `timestamp >= cutoff`, oldest first
    pub fn window_since(&self, cutoff: i64) -> Vec<Measurement> {
        self.samples.iter().filter(|m| m.timestamp >= cutoff).cloned().collect()
    }

    /// Every measurement, oldest first
    pub fn all(&self) -> Vec<Measurement> {
        self.samples.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&Measurement> {
        self.samples.back()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: i64) -> Measurement {
        Measurement::success(timestamp, 10)
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut history = SampleHistory::new();
        for ts in 0..101 {
            history.append(sample(ts));
        }

        assert_eq!(history.len(), HISTORY_CAPACITY);
        let all = history.all();
        assert_eq!(all.first().map(|m| m.timestamp), Some(1));
        assert_eq!(all.last().map(|m| m.timestamp), Some(100));
        assert!(all.windows(2).all(|pair| pair[0].timestamp < pair[1].timestamp));
    }

    #[test]
    fn test_window_is_inclusive() {
        let mut history = SampleHistory::new();
        for ts in [100, 200, 300, 400] {
            history.append(sample(ts));
        }

        let window: Vec<i64> = history.window_since(200).iter().map(|m| m.timestamp).collect();
        assert_eq!(window, vec![200, 300, 400]);
        assert!(history.window_since(401).is_empty());
        assert_eq!(history.window_since(i64::MIN).len(), 4);
    }

    #[test]
    fn test_clear() {
        let mut history = SampleHistory::with_capacity(3);
        history.append(sample(1));
        history.append(sample(2));
        history.clear();

        assert!(history.is_empty());
        assert!(history.latest().is_none());
        assert_eq!(history.capacity(), 3);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut history = SampleHistory::new();
        history.append(sample(1));
        let snapshot = history.all();
        history.append(sample(2));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(history.len(), 2);
    }
}
