//! # CAN Telemetry Module
//!
//! Environmental and wind telemetry from the ESP32 sensor node.
//!
//! This module handles:
//! - Decoding the fixed-format binary frames (`0x10` environment, `0x11` wind)
//! - Converting anemometer counts to volts and wind speed
//! - Receiving frames with a short timeout and retaining the latest values

pub mod frame;
pub mod wind;
pub mod receiver;

pub use frame::{decode_frame, Environment, RawFrame, TelemetryFrame};
pub use receiver::{CanTelemetry, FrameSource};
pub use wind::WindReading;
