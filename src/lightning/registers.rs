//! # AS3935 Register Map
//!
//! Register addresses, field widths and command-byte encoding for the
//! AS3935 lightning sensor.
//!
//! Every value is masked to its field width before it reaches the wire.
//! Out-of-range settings are truncated, never rejected.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// AFE gain register
pub const REG_AFE_GAIN: u8 = 0x00;

/// Noise floor (bits 6:4) and watchdog threshold (bits 3:0)
pub const REG_NOISE_WATCHDOG: u8 = 0x01;

/// Spike rejection (bits 3:0)
pub const REG_SPIKE_REJECTION: u8 = 0x02;

/// Interrupt source (bits 3:0)
pub const REG_INTERRUPT: u8 = 0x03;

/// Estimated storm distance in km (bits 5:0)
pub const REG_DISTANCE: u8 = 0x07;

/// Interrupt mask register, written as zero to unmask every source
pub const REG_INTERRUPT_MASK: u8 = 0x08;

/// Reserved calibration register targeted by the raw calibration pulse
pub const REG_CALIBRATION: u8 = 0x3D;

/// Calibration pulse: start command
pub const CALIBRATION_START: [u8; 2] = [REG_CALIBRATION, 0x96];

/// Calibration pulse: stop command
pub const CALIBRATION_STOP: [u8; 2] = [REG_CALIBRATION, 0x16];

/// AFE gain constant for outdoor operation (less sensitive)
pub const AFE_GAIN_OUTDOOR: u8 = 0x12;

/// AFE gain constant for indoor operation (more sensitive)
pub const AFE_GAIN_INDOOR: u8 = 0x0E;

/// Value written to the interrupt mask register to unmask noise,
/// disturber and lightning interrupts
pub const INTERRUPT_MASK_NONE: u8 = 0x00;

/// Register address bits within a command byte
pub const ADDRESS_MASK: u8 = 0x3F;

/// Data bits carried by a register write
pub const DATA_MASK: u8 = 0x3F;

/// High-bit pattern marking a read command
pub const READ_FLAG: u8 = 0x40;

/// High-bit pattern marking a write command
pub const WRITE_FLAG: u8 = 0x00;

/// Interrupt source field width
pub const INTERRUPT_SOURCE_MASK: u8 = 0x0F;

/// Distance field width
pub const DISTANCE_MASK: u8 = 0x3F;

/// Noise floor field width (3 bits)
pub const NOISE_FLOOR_MASK: u8 = 0x07;

/// Watchdog threshold field width (4 bits)
pub const WATCHDOG_MASK: u8 = 0x0F;

/// Spike rejection field width (4 bits)
pub const SPIKE_REJECTION_MASK: u8 = 0x0F;

/// Analog front-end gain mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum AfeMode {
    /// Reduced sensitivity for an exposed antenna
    #[default]
    Outdoor,
    /// Increased sensitivity for an enclosed antenna
    Indoor,
}

impl AfeMode {
    /// AFE gain register constant for this mode
    pub fn gain(self) -> u8 {
        match self {
            AfeMode::Outdoor => AFE_GAIN_OUTDOOR,
            AfeMode::Indoor => AFE_GAIN_INDOOR,
        }
    }
}

impl FromStr for AfeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "outdoor" => Ok(AfeMode::Outdoor),
            "indoor" => Ok(AfeMode::Indoor),
            other => Err(format!("unknown AFE mode '{}' (expected 'outdoor' or 'indoor')", other)),
        }
    }
}

impl TryFrom<String> for AfeMode {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AfeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AfeMode::Outdoor => write!(f, "outdoor"),
            AfeMode::Indoor => write!(f, "indoor"),
        }
    }
}

/// Sensor settings applied during initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub mode: AfeMode,
    /// Noise floor level (3 bits, 0-7)
    pub noise_floor: u8,
    /// Watchdog threshold (4 bits, 0-15)
    pub watchdog: u8,
    /// Spike rejection level (4 bits, 0-15)
    pub spike_rejection: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            mode: AfeMode::Outdoor,
            noise_floor: 2,
            watchdog: 2,
            spike_rejection: 2,
        }
    }
}

impl DeviceConfig {
    /// Packed value for the noise-floor / watchdog register
    pub fn noise_watchdog_byte(&self) -> u8 {
        pack_noise_watchdog(self.noise_floor, self.watchdog)
    }

    /// Masked value for the spike-rejection register
    pub fn spike_rejection_byte(&self) -> u8 {
        self.spike_rejection & SPIKE_REJECTION_MASK
    }
}

/// Pack noise floor and watchdog into one register byte
///
/// `((noise_floor & 0x07) << 4) | (watchdog & 0x0F)`
pub fn pack_noise_watchdog(noise_floor: u8, watchdog: u8) -> u8 {
    ((noise_floor & NOISE_FLOOR_MASK) << 4) | (watchdog & WATCHDOG_MASK)
}

/// Encode a register write as the two bytes sent on the bus
pub fn encode_write(reg: u8, value: u8) -> [u8; 2] {
    [WRITE_FLAG | (reg & ADDRESS_MASK), value & DATA_MASK]
}

/// Encode a register read; the value arrives in the second response byte
pub fn encode_read(reg: u8) -> [u8; 2] {
    [READ_FLAG | (reg & ADDRESS_MASK), 0x00]
}
