//! # Logger Module
//!
//! Append-only persistence of fused snapshots.
//!
//! - `csv`: fixed column set, header written once per file
//! - `jsonl`: one serialized snapshot per line
//!
//! Every record is flushed before `append` returns, so a power cut loses at
//! most the record being written.

pub mod csv;
pub mod jsonl;

use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::fusion::Snapshot;

pub use self::csv::CsvLogger;
pub use self::jsonl::JsonlLogger;

/// Destination for fused snapshots
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotSink: Send {
    /// Persist one snapshot
    fn append(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// On-disk record format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Csv,
    Jsonl,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Csv => write!(f, "csv"),
            LogFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Open a sink of the given format, appending to `path`
///
/// # Errors
///
/// Returns `StormPodError::Io` if the file cannot be opened or the CSV
/// header cannot be written.
pub fn open_sink<P: AsRef<Path>>(format: LogFormat, path: P) -> Result<Box<dyn SnapshotSink>> {
    Ok(match format {
        LogFormat::Csv => Box::new(CsvLogger::open(path)?),
        LogFormat::Jsonl => Box::new(JsonlLogger::open(path)?),
    })
}
