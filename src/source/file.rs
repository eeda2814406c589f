//! File-based telemetry source.
//!
//! Polls a JSON file holding a `GET /api/v1/clusters` payload.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use shardwatch_adapters::{ClustersPayload, TimestampUnit};
use shardwatch_types::{TelemetrySnapshot, Timestamp};

use super::TelemetrySource;

/// A source that reads cluster telemetry from a JSON file.
///
/// The source tracks the file's modification time and only returns
/// new data when the file has been updated.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    unit: TimestampUnit,
    max_concurrency: Option<u32>,
    last_error: Option<String>,
    last_modified: Option<SystemTime>,
}

impl FileSource {
    /// Create a new file source for the given path.
    pub fn new<P: AsRef<Path>>(path: P, unit: TimestampUnit) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            unit,
            max_concurrency: None,
            last_error: None,
            last_modified: None,
        }
    }

    /// Override the start concurrency found in the file.
    pub fn with_max_concurrency(mut self, max_concurrency: Option<u32>) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Returns the path being monitored.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    /// Read and convert the file.
    pub fn read(&mut self) -> Option<TelemetrySnapshot> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                self.last_error = Some(format!("Read error: {}", e));
                return None;
            }
        };
        match serde_json::from_str::<ClustersPayload>(&content) {
            Ok(payload) => {
                self.last_error = None;
                Some(payload.into_snapshot(self.unit, Timestamp::now(), self.max_concurrency))
            }
            Err(e) => {
                self.last_error = Some(format!("Parse error: {}", e));
                None
            }
        }
    }
}

impl TelemetrySource for FileSource {
    fn poll(&mut self) -> Option<TelemetrySnapshot> {
        let current_modified = self.modified_time();

        let file_changed = match (&self.last_modified, &current_modified) {
            (None, _) => true,        // First poll, always read
            (Some(_), None) => false, // File disappeared, keep the last data
            (Some(last), Some(current)) => current > last,
        };

        if file_changed {
            if let Some(snapshot) = self.read() {
                self.last_modified = current_modified;
                return Some(snapshot);
            }
        }

        None
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn sample_json() -> &'static str {
        r#"{
            "max_concurrency": 4,
            "clusters": [
                {"id": 0, "shards": [
                    {"shard_id": 0, "up": true, "status": "connected", "latency": 40,
                     "last_heartbeat": 1700000000}
                ]}
            ]
        }"#
    }

    #[test]
    fn test_file_source_new() {
        let source = FileSource::new("/tmp/clusters.json", TimestampUnit::Millis);
        assert_eq!(source.path(), Path::new("/tmp/clusters.json"));
        assert_eq!(source.description(), "file: /tmp/clusters.json");
        assert!(source.error().is_none());
    }

    #[test]
    fn test_file_source_poll_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let mut source = FileSource::new(file.path(), TimestampUnit::Seconds);

        let snapshot = source.poll().unwrap();
        assert_eq!(snapshot.max_concurrency, 4);
        let shard = snapshot.shards().next().unwrap();
        assert_eq!(shard.last_heartbeat, Timestamp::from_secs(1_700_000_000));

        // Unchanged file yields nothing new
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_file_source_detects_changes() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), sample_json()).unwrap();

        let mut source = FileSource::new(file.path(), TimestampUnit::Millis);
        assert!(source.poll().is_some());

        fs::write(
            file.path(),
            r#"{"max_concurrency": 8, "clusters": [{"id": 0}, {"id": 1}]}"#,
        )
        .unwrap();
        // Push the mtime forward explicitly so coarse filesystem clocks
        // still register the change.
        let later = SystemTime::now() + Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(file.path())
            .unwrap()
            .set_modified(later)
            .unwrap();

        let snapshot = source.poll().unwrap();
        assert_eq!(snapshot.max_concurrency, 8);
        assert_eq!(snapshot.clusters.len(), 2);
    }

    #[test]
    fn test_file_source_concurrency_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let mut source =
            FileSource::new(file.path(), TimestampUnit::Millis).with_max_concurrency(Some(32));
        assert_eq!(source.poll().unwrap().max_concurrency, 32);
    }

    #[test]
    fn test_file_source_missing_file() {
        let mut source = FileSource::new("/nonexistent/path/clusters.json", TimestampUnit::Millis);

        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Read error"));
    }

    #[test]
    fn test_file_source_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let mut source = FileSource::new(file.path(), TimestampUnit::Millis);

        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Parse error"));
    }
}
