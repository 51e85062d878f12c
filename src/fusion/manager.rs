//! # Fusion Manager
//!
//! Polls the four sources in a fixed order, merges their field sets into one
//! snapshot, stamps it with a time of day and hands it to the persistence
//! sink.
//!
//! Merge order is telemetry, position, lightning, orientation. A later
//! source overwrites an earlier one on every key it owns, present or not:
//! `speed_kph` is always the position source's ground speed and
//! `heading_deg` always the orientation sensor's heading, empty when that
//! source has no value this cycle.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::snapshot::Snapshot;
use super::source::FieldSource;
use crate::logger::SnapshotSink;

/// Fuses the sensor sources into one snapshot per cycle
pub struct FusionManager {
    telemetry: Box<dyn FieldSource>,
    position: Box<dyn FieldSource>,
    lightning: Box<dyn FieldSource>,
    orientation: Box<dyn FieldSource>,
    sink: Option<Box<dyn SnapshotSink>>,
    latest: Option<Snapshot>,
    cycles: u64,
}

impl FusionManager {
    pub fn new(
        telemetry: Box<dyn FieldSource>,
        position: Box<dyn FieldSource>,
        lightning: Box<dyn FieldSource>,
        orientation: Box<dyn FieldSource>,
    ) -> Self {
        Self {
            telemetry,
            position,
            lightning,
            orientation,
            sink: None,
            latest: None,
            cycles: 0,
        }
    }

    /// Persist every snapshot to `sink`
    pub fn with_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run one cycle stamped with the current wall-clock time
    pub fn poll_cycle(&mut self) -> Snapshot {
        self.poll_cycle_at(Utc::now())
    }

    /// Run one cycle, using `now` when the position source has no time
    ///
    /// The snapshot is built fresh: a field no source reports this cycle is
    /// absent. A sink failure is logged and the snapshot is still returned.
    pub fn poll_cycle_at(&mut self, now: DateTime<Utc>) -> Snapshot {
        let mut snapshot = Snapshot::new();

        merge_source(&mut snapshot, self.telemetry.as_mut());
        let gps_time = merge_source(&mut snapshot, self.position.as_mut());
        merge_source(&mut snapshot, self.lightning.as_mut());
        merge_source(&mut snapshot, self.orientation.as_mut());

        snapshot.time_utc = Some(gps_time.unwrap_or_else(|| now.format("%H%M%S").to_string()));

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.append(&snapshot) {
                warn!("Failed to persist snapshot: {}", e);
            }
        }

        self.cycles += 1;
        self.latest = Some(snapshot.clone());
        snapshot
    }

    /// Snapshot produced by the most recent cycle
    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    /// Number of completed cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

/// Clear the source's owned keys, then apply what it reported
///
/// Returns the source's `time_utc`.
fn merge_source(snapshot: &mut Snapshot, source: &mut dyn FieldSource) -> Option<String> {
    let fields = source.read_fields();
    debug!("{} contributed {:?}", source.name(), fields);

    for key in source.owned_fields() {
        snapshot.clear(key);
    }
    let time_utc = fields.time_utc.clone();
    snapshot.overlay(fields);
    time_utc
}
