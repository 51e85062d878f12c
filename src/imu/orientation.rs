//! # Orientation Estimator
//!
//! Compass heading from the IMU's rotation-vector quaternion, with a
//! last-known-value fallback.

use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::fusion::{FieldSource, Snapshot};
use crate::units::round_to;

/// Default number of feature-enable attempts
pub const DEFAULT_ENABLE_ATTEMPTS: u32 = 3;

/// Default wait between feature-enable attempts
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Keys published by the heading estimator
pub const ORIENTATION_FIELDS: &[&str] = &["heading_deg"];

/// Unit quaternion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Yaw in degrees, normalized to [0, 360)
    ///
    /// `atan2(2(wz + xy), 1 - 2(y² + z²))`
    pub fn heading_deg(&self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        let yaw = siny_cosp.atan2(cosy_cosp).to_degrees();
        (yaw + 360.0) % 360.0
    }
}

/// An orientation sensor reporting rotation-vector quaternions
#[cfg_attr(test, mockall::automock)]
pub trait QuaternionSource: Send {
    /// Enable rotation-vector reports
    fn enable_rotation_vector(&mut self) -> Result<()>;

    /// Latest quaternion, `Ok(None)` when no new report is available
    fn rotation_vector(&mut self) -> Result<Option<Quaternion>>;
}

/// Heading estimator with last-known-value fallback
pub struct OrientationEstimator<Q> {
    device: Q,
    ready: bool,
    last_heading: Option<f64>,
}

impl<Q: QuaternionSource> OrientationEstimator<Q> {
    /// Enable the rotation vector, retrying up to `attempts` times
    ///
    /// A sensor that never enables is kept but marked unavailable; every
    /// later read then returns the fallback heading.
    pub fn new(mut device: Q, attempts: u32, backoff: Duration) -> Self {
        let mut ready = false;
        for attempt in 1..=attempts {
            match device.enable_rotation_vector() {
                Ok(()) => {
                    info!("IMU rotation vector enabled on try {}", attempt);
                    ready = true;
                    break;
                }
                Err(e) => {
                    warn!("IMU enable failed on try {}: {}", attempt, e);
                    if attempt < attempts {
                        thread::sleep(backoff);
                    }
                }
            }
        }

        if !ready {
            error!("IMU failed to initialize, heading data will be unavailable");
        }

        Self {
            device,
            ready,
            last_heading: None,
        }
    }

    /// Whether the sensor came up
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Current heading in degrees [0, 360), rounded to 0.1
    ///
    /// Falls back to the last computed heading when the sensor is
    /// unavailable, the read fails or no report is pending; `None` only if
    /// no heading was ever computed.
    pub fn heading(&mut self) -> Option<f64> {
        if !self.ready {
            return self.last_heading;
        }

        match self.device.rotation_vector() {
            Ok(Some(q)) => {
                let heading = round_to(q.heading_deg(), 1);
                // Rounding can carry 359.95.. up to 360.0
                let heading = if heading >= 360.0 { heading - 360.0 } else { heading };
                self.last_heading = Some(heading);
            }
            Ok(None) => {}
            Err(e) => warn!("IMU read error: {}", e),
        }
        self.last_heading
    }

    /// Last computed heading without touching the sensor
    pub fn last_heading(&self) -> Option<f64> {
        self.last_heading
    }
}

impl<Q: QuaternionSource> FieldSource for OrientationEstimator<Q> {
    fn name(&self) -> &'static str {
        "imu"
    }

    fn owned_fields(&self) -> &'static [&'static str] {
        ORIENTATION_FIELDS
    }

    fn read_fields(&mut self) -> Snapshot {
        Snapshot {
            heading_deg: self.heading(),
            ..Snapshot::default()
        }
    }
}
