//! # IMU Module
//!
//! Compass heading from a BNO08x orientation sensor.
//!
//! - `orientation`: quaternion-to-yaw conversion and the heading estimator
//! - `bno08x`: SHTP driver that enables and reads the rotation vector

pub mod bno08x;
pub mod orientation;

pub use bno08x::{Bno08x, BNO08X_DEFAULT_ADDRESS};
pub use orientation::{
    OrientationEstimator, Quaternion, QuaternionSource, DEFAULT_ENABLE_ATTEMPTS,
    DEFAULT_RETRY_BACKOFF,
};
