//! # StormPOD Library
//!
//! Sensor acquisition and fusion for the StormPOD mobile weather-monitoring
//! unit.
//!
//! Four sources feed one timestamped snapshot per poll cycle:
//! - an AS3935 lightning sensor on SPI with an interrupt line
//! - environmental and wind telemetry frames on a CAN bus
//! - NMEA position sentences from a serial GPS receiver
//! - compass heading from a BNO08x IMU on I2C
//!
//! Each snapshot is appended to a CSV or JSON Lines log.

pub mod config;
pub mod error;
pub mod units;
pub mod lightning;
pub mod can;
pub mod gps;
pub mod imu;
pub mod fusion;
pub mod logger;

#[cfg(feature = "hardware")]
pub mod hardware;
