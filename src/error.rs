//! # Error Types
//!
//! Custom error types for StormPOD using `thiserror`.

use thiserror::Error;

/// Main error type for StormPOD
#[derive(Debug, Error)]
pub enum StormPodError {
    /// Register-bus (SPI / I2C) transaction failures
    #[error("Sensor bus error: {0}")]
    Bus(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// A device could not be brought up and will not deliver data
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Snapshot serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for StormPOD
pub type Result<T> = std::result::Result<T, StormPodError>;
