//! # Telemetry Frame Decoder
//!
//! Decodes the two fixed-format frames the ESP32 sensor node broadcasts on
//! the CAN bus.
//!
//! | ID     | DLC | Payload (big-endian u16)                         |
//! |--------|-----|--------------------------------------------------|
//! | `0x10` | 6   | temperature ×10, humidity ×10, pressure ×10     |
//! | `0x11` | 4   | vane angle ×10, anemometer ADC counts (0-1023)   |

use bytes::{Buf, Bytes};

use super::wind::WindReading;

/// Environmental frame identifier
pub const FRAME_ID_ENVIRONMENT: u32 = 0x10;

/// Wind frame identifier
pub const FRAME_ID_WIND: u32 = 0x11;

/// Environmental frame payload length
pub const ENVIRONMENT_FRAME_LEN: u8 = 6;

/// Wind frame payload length
pub const WIND_FRAME_LEN: u8 = 4;

/// One received frame as it came off the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Frame identifier
    pub id: u32,
    /// Declared data length code
    pub dlc: u8,
    /// Payload bytes
    pub data: Bytes,
}

impl RawFrame {
    pub fn new(id: u32, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            id,
            dlc: data.len().min(u8::MAX as usize) as u8,
            data,
        }
    }
}

/// Environmental values from frame `0x10`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    /// Temperature in °C
    pub temperature_c: f64,
    /// Relative humidity in %
    pub humidity_pct: f64,
    /// Pressure in hPa
    pub pressure_hpa: f64,
}

/// A decoded telemetry frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryFrame {
    Environment(Environment),
    Wind(WindReading),
}

/// Decode a frame
///
/// Returns `None` for unknown identifiers and for a known identifier whose
/// length does not match; such frames are dropped whole, never partially
/// decoded.
pub fn decode_frame(frame: &RawFrame) -> Option<TelemetryFrame> {
    if frame.data.len() != frame.dlc as usize {
        return None;
    }

    let mut payload = frame.data.clone();
    match (frame.id, frame.dlc) {
        (FRAME_ID_ENVIRONMENT, ENVIRONMENT_FRAME_LEN) => {
            let temperature = payload.get_u16();
            let humidity = payload.get_u16();
            let pressure = payload.get_u16();
            Some(TelemetryFrame::Environment(Environment {
                temperature_c: temperature as f64 / 10.0,
                humidity_pct: humidity as f64 / 10.0,
                pressure_hpa: pressure as f64 / 10.0,
            }))
        }
        (FRAME_ID_WIND, WIND_FRAME_LEN) => {
            let angle_raw = payload.get_u16();
            let wind_raw = payload.get_u16();
            Some(TelemetryFrame::Wind(WindReading::from_raw(angle_raw, wind_raw)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_environment() {
        // 21.5 °C, 48.2 %, 1013.2 hPa
        let frame = RawFrame::new(0x10, vec![0x00, 0xD7, 0x01, 0xE2, 0x27, 0x94]);

        match decode_frame(&frame) {
            Some(TelemetryFrame::Environment(env)) => {
                assert!((env.temperature_c - 21.5).abs() < 1e-9);
                assert!((env.humidity_pct - 48.2).abs() < 1e-9);
                assert!((env.pressure_hpa - 1013.2).abs() < 1e-9);
            }
            other => panic!("Expected environment frame, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_wind() {
        // 270.0°, ADC 512
        let frame = RawFrame::new(0x11, vec![0x0A, 0x8C, 0x02, 0x00]);

        match decode_frame(&frame) {
            Some(TelemetryFrame::Wind(wind)) => {
                assert_eq!(wind.angle_raw, 2700);
                assert_eq!(wind.wind_raw, 512);
                assert!((wind.angle_deg() - 270.0).abs() < 1e-9);
            }
            other => panic!("Expected wind frame, got {:?}", other),
        }
    }

    #[test]
    fn test_environment_wrong_length_discarded() {
        let frame = RawFrame::new(0x10, vec![0x00, 0xD7, 0x01, 0xE2, 0x27]);
        assert_eq!(frame.dlc, 5);
        assert_eq!(decode_frame(&frame), None);

        let frame = RawFrame::new(0x10, vec![0u8; 8]);
        assert_eq!(decode_frame(&frame), None);
    }

    #[test]
    fn test_wind_wrong_length_discarded() {
        let frame = RawFrame::new(0x11, vec![0x0A, 0x8C, 0x02]);
        assert_eq!(decode_frame(&frame), None);
    }

    #[test]
    fn test_declared_length_must_match_payload() {
        let frame = RawFrame {
            id: 0x10,
            dlc: 6,
            data: Bytes::from_static(&[0x00, 0xD7, 0x01]),
        };
        assert_eq!(decode_frame(&frame), None);
    }

    #[test]
    fn test_unknown_identifier_ignored() {
        let frame = RawFrame::new(0x12, vec![0u8; 6]);
        assert_eq!(decode_frame(&frame), None);
    }
}
