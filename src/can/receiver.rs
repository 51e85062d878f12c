//! # Telemetry Receiver
//!
//! Pulls at most one frame per poll from the telemetry bus and keeps the
//! most recent decoded environmental and wind values.
//!
//! The sensor node sends the environmental frame every 500 ms and the wind
//! frame every 200 ms, so a single short receive sees at most one of them.
//! The receiver therefore republishes the last decoded values of each kind
//! until a newer frame replaces them.

use std::io;
use std::time::Duration;
use tracing::{debug, warn};

use super::frame::{decode_frame, Environment, RawFrame, TelemetryFrame};
use super::wind::WindReading;
use crate::units::round_to;
use crate::fusion::{FieldSource, Snapshot};

/// Default receive timeout per poll
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Keys published from the retained telemetry values
pub const TELEMETRY_FIELDS: &[&str] = &[
    "temp_C",
    "humidity_%",
    "pressure_hPa",
    "angle_deg",
    "wind_raw",
    "wind_volts",
    "speed_kph",
];

/// A bus that delivers telemetry frames
pub trait FrameSource: Send {
    /// Wait up to `timeout` for one frame; `Ok(None)` when the bus is idle
    fn recv(&mut self, timeout: Duration) -> io::Result<Option<RawFrame>>;
}

/// Telemetry bus receiver
pub struct CanTelemetry<S> {
    bus: S,
    timeout: Duration,
    environment: Option<Environment>,
    wind: Option<WindReading>,
}

impl<S: FrameSource> CanTelemetry<S> {
    pub fn new(bus: S, timeout: Duration) -> Self {
        Self {
            bus,
            timeout,
            environment: None,
            wind: None,
        }
    }

    /// Receive and decode at most one frame
    ///
    /// Returns the frame decoded by this call, if any. Idle bus, unknown
    /// frames, bad lengths and I/O errors all leave the retained values
    /// unchanged.
    pub fn update(&mut self) -> Option<TelemetryFrame> {
        let raw = match self.bus.recv(self.timeout) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Telemetry bus read failed: {}", e);
                return None;
            }
        };

        let decoded = decode_frame(&raw);
        match decoded {
            Some(TelemetryFrame::Environment(env)) => self.environment = Some(env),
            Some(TelemetryFrame::Wind(wind)) => self.wind = Some(wind),
            None => debug!(
                "Dropped telemetry frame id 0x{:X} ({} bytes)",
                raw.id,
                raw.data.len()
            ),
        }
        decoded
    }

    /// Fields for the retained values
    pub fn fields(&self) -> Snapshot {
        let mut fields = Snapshot::default();
        if let Some(env) = self.environment {
            fields.temp_c = Some(env.temperature_c);
            fields.humidity_pct = Some(env.humidity_pct);
            fields.pressure_hpa = Some(env.pressure_hpa);
        }
        if let Some(wind) = self.wind {
            fields.angle_deg = Some(wind.angle_deg());
            fields.wind_raw = Some(wind.wind_raw);
            fields.wind_volts = Some(round_to(wind.volts, 3));
            fields.speed_kph = Some(wind.speed_kph);
        }
        fields
    }

    /// Release the bus handle
    pub fn into_inner(self) -> S {
        self.bus
    }
}

impl<S: FrameSource> FieldSource for CanTelemetry<S> {
    fn name(&self) -> &'static str {
        "can"
    }

    fn owned_fields(&self) -> &'static [&'static str] {
        TELEMETRY_FIELDS
    }

    fn read_fields(&mut self) -> Snapshot {
        self.update();
        self.fields()
    }
}
