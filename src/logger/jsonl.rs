//! JSON Lines snapshot log.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use super::SnapshotSink;
use crate::error::Result;
use crate::fusion::Snapshot;

/// Appending JSONL writer, absent fields are omitted from each object
pub struct JsonlLogger {
    writer: BufWriter<File>,
}

impl JsonlLogger {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("Appending snapshots to {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl SnapshotSink for JsonlLogger {
    fn append(&mut self, snapshot: &Snapshot) -> Result<()> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    #[test]
    fn test_one_object_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let mut logger = JsonlLogger::open(&path).unwrap();

        logger
            .append(&Snapshot {
                time_utc: Some("010203".to_string()),
                fix: Some(false),
                ..Snapshot::default()
            })
            .unwrap();
        logger
            .append(&Snapshot {
                lightning: Some(true),
                distance_km: Some(5),
                event_timestamp: Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
                ..Snapshot::default()
            })
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"time_utc":"010203","fix":false}"#);

        let value: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(value["lightning"], true);
        assert_eq!(value["distance_km"], 5);
        assert_eq!(value["timestamp"], "2025-06-01T12:00:00Z");
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, "{\"fix\":true}\n").unwrap();

        JsonlLogger::open(&path)
            .unwrap()
            .append(&Snapshot::default())
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"fix\":true}\n{}\n");
    }
}
