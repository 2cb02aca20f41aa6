use std::path::{Path, PathBuf};

use async_trait::async_trait;
use linkwatch::{Measurement, MeasurementRecord, MeasurementSink, SinkError};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Sink appending one JSON record per line to a file
pub struct JsonlSink {
    path: PathBuf,
    /// Serializes appends and truncation
    lock: Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the newest `limit` records as measurements, oldest first.
    ///
    /// A missing file is an empty history; malformed lines are skipped.
    pub async fn load_recent(&self, limit: usize) -> Result<Vec<Measurement>, SinkError> {
        let _guard = self.lock.lock().await;
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MeasurementRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = index + 1, "Skipping malformed record: {}", e),
            }
        }

        let skip = records.len().saturating_sub(limit);
        Ok(records.iter().skip(skip).map(MeasurementRecord::to_measurement).collect())
    }
}

#[async_trait]
impl MeasurementSink for JsonlSink {
    async fn submit(&self, record: &MeasurementRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(&line).await?;
        file.flush().await?;

        debug!(check_id = record.check_id, "Record appended");
        Ok(())
    }

    async fn clear(&self) -> Result<(), SinkError> {
        let _guard = self.lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use linkwatch::{FailureCategory, ResultCode};

    use super::*;

    fn record(check_id: u64, measurement: &Measurement) -> MeasurementRecord {
        MeasurementRecord::from_measurement(measurement, check_id)
    }

    #[tokio::test]
    async fn test_submit_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("data/records.jsonl"));

        sink.submit(&record(1, &Measurement::success(1_000, 25))).await.unwrap();
        sink.submit(&record(
            2,
            &Measurement::failure(2_000, FailureCategory::Timeout, "Request timed out after 5000ms"),
        ))
        .await
        .unwrap();

        let raw = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["checkId"], 1);
        assert_eq!(first["resultCode"], "good");
        assert_eq!(first["pingTimeMs"], 25);

        let second: MeasurementRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.result_code, ResultCode::Bad);
        assert_eq!(second.ping_time_ms, None);
    }

    #[tokio::test]
    async fn test_load_recent_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("records.jsonl"));
        for i in 0..5 {
            let measurement = Measurement::success(1_000 * (i as i64 + 1), 10);
            sink.submit(&record(i, &measurement)).await.unwrap();
        }

        let restored = sink.load_recent(3).await.unwrap();
        let timestamps: Vec<i64> = restored.iter().map(|m| m.timestamp).collect();
        assert_eq!(timestamps, vec![3_000, 4_000, 5_000]);
    }

    #[tokio::test]
    async fn test_load_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let good = serde_json::to_string(&record(9, &Measurement::success(7_000, 12))).unwrap();
        std::fs::write(&path, format!("not json\n{good}\n\n")).unwrap();

        let restored = JsonlSink::new(&path).load_recent(100).await.unwrap();
        assert_eq!(restored, vec![Measurement::success(7_000, 12)]);
    }

    #[tokio::test]
    async fn test_clear_removes_records() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("records.jsonl"));

        // Clearing before anything was written is fine
        sink.clear().await.unwrap();

        sink.submit(&record(1, &Measurement::success(1_000, 5))).await.unwrap();
        sink.clear().await.unwrap();
        assert!(sink.load_recent(100).await.unwrap().is_empty());
    }
}
