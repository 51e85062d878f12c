//! # Wind Conversion
//!
//! Converts anemometer ADC counts to volts and wind speed.
//!
//! The anemometer outputs 0.4 V at rest and 2.0 V at 116.6 km/h. The MCP3008
//! samples it against a 3.3 V reference (10-bit), and readings are clamped
//! at 2.2 V.
//!
//! ```text
//! volts     = min(raw / 1023 × 3.3, 2.2)
//! speed_kph = 0                                        if volts <= 0.4
//!           = round((volts - 0.4) × 116.6 / 1.6, 1)     otherwise
//! ```

/// ADC full-scale count
pub const ADC_FULL_SCALE: f64 = 1023.0;

/// ADC reference voltage
pub const ADC_REFERENCE_VOLTS: f64 = 3.3;

/// Highest voltage accepted from the anemometer
pub const MAX_WIND_VOLTS: f64 = 2.2;

/// Anemometer output at zero wind
pub const ZERO_WIND_VOLTS: f64 = 0.4;

/// Anemometer output at its rated maximum speed
pub const MAX_SENSOR_VOLTS: f64 = 2.0;

/// Rated maximum wind speed in km/h
pub const MAX_WIND_KPH: f64 = 116.6;

use crate::units::round_to;

/// Decoded wind frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindReading {
    /// Vane angle in tenths of a degree
    pub angle_raw: u16,
    /// Anemometer ADC counts
    pub wind_raw: u16,
    /// Clamped anemometer voltage
    pub volts: f64,
    /// Wind speed in km/h, rounded to 0.1, never negative
    pub speed_kph: f64,
}

impl WindReading {
    pub fn from_raw(angle_raw: u16, wind_raw: u16) -> Self {
        let volts = wind_volts(wind_raw);
        Self {
            angle_raw,
            wind_raw,
            volts,
            speed_kph: wind_speed_kph(volts),
        }
    }

    /// Vane angle in degrees
    pub fn angle_deg(&self) -> f64 {
        self.angle_raw as f64 / 10.0
    }
}

/// ADC counts to volts, clamped at [`MAX_WIND_VOLTS`]
pub fn wind_volts(raw: u16) -> f64 {
    (raw as f64 / ADC_FULL_SCALE * ADC_REFERENCE_VOLTS).min(MAX_WIND_VOLTS)
}

/// Volts to km/h
pub fn wind_speed_kph(volts: f64) -> f64 {
    if volts <= ZERO_WIND_VOLTS {
        return 0.0;
    }
    let scale = MAX_WIND_KPH / (MAX_SENSOR_VOLTS - ZERO_WIND_VOLTS);
    round_to((volts - ZERO_WIND_VOLTS) * scale, 1)
}
