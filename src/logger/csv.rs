//! CSV snapshot log with the fixed column set.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use super::SnapshotSink;
use crate::error::Result;
use crate::fusion::snapshot::COLUMNS;
use crate::fusion::Snapshot;

/// Appending CSV writer
pub struct CsvLogger {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl CsvLogger {
    /// Open `path` for appending
    ///
    /// The header row is written only when the file is new or empty, so
    /// restarting the logger never repeats it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);

        if needs_header {
            writeln!(writer, "{}", COLUMNS.join(","))?;
            writer.flush()?;
            info!("Created snapshot log {}", path.display());
        } else {
            info!("Appending to snapshot log {}", path.display());
        }

        Ok(Self { writer, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One CSV row; absent fields become empty cells
pub fn format_row(snapshot: &Snapshot) -> String {
    COLUMNS
        .iter()
        .map(|column| snapshot.column(column).map(escape).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(",")
}

fn escape(value: String) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

impl SnapshotSink for CsvLogger {
    fn append(&mut self, snapshot: &Snapshot) -> Result<()> {
        writeln!(self.writer, "{}", format_row(snapshot))?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HEADER: &str = "time_utc,temp_C,humidity_%,pressure_hPa,altitude_m,wind_raw,wind_volts,speed_kph,fix,lat,lon,heading_deg,lightning,distance_km";

    fn sample() -> Snapshot {
        Snapshot {
            time_utc: Some("123519".to_string()),
            temp_c: Some(21.5),
            humidity_pct: Some(48.2),
            pressure_hpa: Some(1013.2),
            fix: Some(true),
            lightning: Some(true),
            distance_km: Some(14),
            noise: Some(false),
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_format_row_empty_cells() {
        assert_eq!(
            format_row(&sample()),
            "123519,21.5,48.2,1013.2,,,,,true,,,,true,14"
        );
        assert_eq!(format_row(&Snapshot::default()), ",".repeat(13));
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stormpod_log.csv");

        let mut logger = CsvLogger::open(&path).unwrap();
        logger.append(&sample()).unwrap();
        drop(logger);

        let mut logger = CsvLogger::open(&path).unwrap();
        logger.append(&sample()).unwrap();
        assert_eq!(logger.path(), path.as_path());

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], lines[2]);
    }

    #[test]
    fn test_header_written_to_empty_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();

        CsvLogger::open(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().next(), Some(HEADER));
    }

    #[test]
    fn test_record_flushed_immediately() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flush.csv");

        let mut logger = CsvLogger::open(&path).unwrap();
        logger.append(&sample()).unwrap();

        // Still open: the row must already be on disk
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("true,14\n"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("12.5".to_string()), "12.5");
        assert_eq!(escape("a,b".to_string()), "\"a,b\"");
        assert_eq!(escape("say \"hi\"".to_string()), "\"say \"\"hi\"\"\"");
    }
}
