//! Lightning sensor as a fusion source.

use embedded_hal::spi::SpiDevice;
use std::sync::Arc;

use super::driver::As3935;
use super::event::{EventKind, LightningEvent};
use crate::fusion::{FieldSource, Snapshot};

/// Keys describing the event drained this cycle
pub const EVENT_FIELDS: &[&str] = &["lightning", "distance_km", "noise", "disturber", "timestamp"];

/// Drains the sensor's pending event once per cycle
pub struct LightningSource<SPI> {
    sensor: Arc<As3935<SPI>>,
}

impl<SPI> LightningSource<SPI> {
    pub fn new(sensor: Arc<As3935<SPI>>) -> Self {
        Self { sensor }
    }
}

/// Flag representation of an event
///
/// Lightning sets `lightning` and `distance_km`, noise sets `noise`,
/// disturber sets `disturber`. An unknown interrupt sets no flag, which
/// reads the same as "monitoring, nothing happened".
pub fn event_fields(event: &LightningEvent) -> Snapshot {
    let mut fields = match event.kind {
        EventKind::Lightning { distance_km } => Snapshot {
            lightning: Some(true),
            distance_km: Some(distance_km),
            ..Snapshot::default()
        },
        EventKind::Noise => Snapshot {
            noise: Some(true),
            ..Snapshot::default()
        },
        EventKind::Disturber => Snapshot {
            disturber: Some(true),
            ..Snapshot::default()
        },
        EventKind::Unknown => return Snapshot::default(),
    };
    fields.event_timestamp = Some(event.timestamp);
    fields
}

impl<SPI: SpiDevice + Send> FieldSource for LightningSource<SPI> {
    fn name(&self) -> &'static str {
        "lightning"
    }

    fn owned_fields(&self) -> &'static [&'static str] {
        EVENT_FIELDS
    }

    fn read_fields(&mut self) -> Snapshot {
        self.sensor
            .read_event()
            .map(|event| event_fields(&event))
            .unwrap_or_default()
    }
}
