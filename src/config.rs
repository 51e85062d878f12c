//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or a missing section) yields
//! the stock StormPOD wiring.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StormPodError};
use crate::lightning::{AfeMode, DeviceConfig};
use crate::logger::LogFormat;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub lightning: LightningConfig,
    #[serde(default)]
    pub can: CanConfig,
    #[serde(default)]
    pub gps: GpsConfig,
    #[serde(default)]
    pub imu: ImuConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// Fusion poll loop
#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// AS3935 lightning sensor wiring and tuning
#[derive(Debug, Deserialize, Clone)]
pub struct LightningConfig {
    #[serde(default = "default_spi_path")]
    pub spi_path: String,

    #[serde(default = "default_spi_speed_hz")]
    pub spi_speed_hz: u32,

    #[serde(default = "default_gpio_chip")]
    pub gpio_chip: String,

    #[serde(default = "default_irq_line")]
    pub irq_line: u32,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub mode: AfeMode,

    #[serde(default = "default_noise_floor")]
    pub noise_floor: i64,

    #[serde(default = "default_watchdog")]
    pub watchdog: i64,

    #[serde(default = "default_spike_rejection")]
    pub spike_rejection: i64,
}

/// Telemetry bus
#[derive(Debug, Deserialize, Clone)]
pub struct CanConfig {
    #[serde(default = "default_can_interface")]
    pub interface: String,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// GPS serial receiver
#[derive(Debug, Deserialize, Clone)]
pub struct GpsConfig {
    #[serde(default = "default_gps_port")]
    pub port: String,

    #[serde(default = "default_gps_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_gps_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_lines_per_poll")]
    pub max_lines_per_poll: usize,
}

/// BNO08x orientation sensor
#[derive(Debug, Deserialize, Clone)]
pub struct ImuConfig {
    #[serde(default = "default_i2c_path")]
    pub i2c_path: String,

    #[serde(default = "default_imu_address")]
    pub address: u8,

    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_enable_attempts")]
    pub enable_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Snapshot persistence
#[derive(Debug, Deserialize, Clone)]
pub struct LoggerConfig {
    #[serde(default = "default_logger_enabled")]
    pub enabled: bool,

    #[serde(default = "default_logger_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub format: LogFormat,
}

/// Diagnostic output of the process itself
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DiagnosticsConfig {
    /// Directory for daily rolling log files, stdout when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

// Default value functions
fn default_interval_ms() -> u64 { 2000 }

fn default_spi_path() -> String { "/dev/spidev0.0".to_string() }
fn default_spi_speed_hz() -> u32 { 500_000 }
fn default_gpio_chip() -> String { "/dev/gpiochip0".to_string() }
fn default_irq_line() -> u32 { 23 }
fn default_debounce_ms() -> u64 { 2 }
fn default_noise_floor() -> i64 { 2 }
fn default_watchdog() -> i64 { 2 }
fn default_spike_rejection() -> i64 { 2 }

fn default_can_interface() -> String { "can0".to_string() }
fn default_read_timeout_ms() -> u64 { 100 }

fn default_gps_port() -> String { "/dev/serial0".to_string() }
fn default_gps_baud_rate() -> u32 { 38400 }
fn default_gps_timeout_ms() -> u64 { 1000 }
fn default_max_lines_per_poll() -> usize { 10 }

fn default_i2c_path() -> String { "/dev/i2c-1".to_string() }
fn default_imu_address() -> u8 { 0x4B }
fn default_settle_ms() -> u64 { 1500 }
fn default_enable_attempts() -> u32 { 3 }
fn default_retry_backoff_ms() -> u64 { 500 }

fn default_logger_enabled() -> bool { true }
fn default_logger_path() -> PathBuf { PathBuf::from("stormpod_log.csv") }

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_ms: default_interval_ms() }
    }
}

impl Default for LightningConfig {
    fn default() -> Self {
        Self {
            spi_path: default_spi_path(),
            spi_speed_hz: default_spi_speed_hz(),
            gpio_chip: default_gpio_chip(),
            irq_line: default_irq_line(),
            debounce_ms: default_debounce_ms(),
            mode: AfeMode::default(),
            noise_floor: default_noise_floor(),
            watchdog: default_watchdog(),
            spike_rejection: default_spike_rejection(),
        }
    }
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            interface: default_can_interface(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            port: default_gps_port(),
            baud_rate: default_gps_baud_rate(),
            timeout_ms: default_gps_timeout_ms(),
            max_lines_per_poll: default_max_lines_per_poll(),
        }
    }
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            i2c_path: default_i2c_path(),
            address: default_imu_address(),
            settle_ms: default_settle_ms(),
            enable_attempts: default_enable_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            enabled: default_logger_enabled(),
            path: default_logger_path(),
            format: LogFormat::default(),
        }
    }
}

impl LightningConfig {
    /// Register settings for the sensor driver
    ///
    /// Values are truncated to their low byte here and masked to the
    /// register field width by the driver, never rejected.
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            mode: self.mode,
            noise_floor: self.noise_floor as u8,
            watchdog: self.watchdog as u8,
            spike_rejection: self.spike_rejection as u8,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails (including an unknown AFE mode or log format)
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use stormpod::config::Config;
    ///
    /// let config = Config::load("config/stormpod.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if a device path is empty or a timing value is out of
    /// its valid range
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_ms < 100 || self.poll.interval_ms > 60000 {
            return Err(invalid("poll interval_ms must be between 100 and 60000"));
        }

        // Validate device paths
        for (name, value) in [
            ("lightning spi_path", &self.lightning.spi_path),
            ("lightning gpio_chip", &self.lightning.gpio_chip),
            ("can interface", &self.can.interface),
            ("gps port", &self.gps.port),
            ("imu i2c_path", &self.imu.i2c_path),
        ] {
            if value.is_empty() {
                return Err(invalid(format!("{} cannot be empty", name)));
            }
        }

        if self.logger.enabled && self.logger.path.as_os_str().is_empty() {
            return Err(invalid("logger path cannot be empty when enabled"));
        }

        if self.lightning.spi_speed_hz == 0 || self.lightning.spi_speed_hz > 2_000_000 {
            return Err(invalid("spi_speed_hz must be between 1 and 2000000"));
        }

        if self.lightning.debounce_ms > 1000 {
            return Err(invalid("debounce_ms must be at most 1000"));
        }

        // Validate timing fields
        if self.can.read_timeout_ms == 0 || self.can.read_timeout_ms > 10000 {
            return Err(invalid("can read_timeout_ms must be between 1 and 10000"));
        }

        if self.gps.timeout_ms == 0 || self.gps.timeout_ms > 10000 {
            return Err(invalid("gps timeout_ms must be between 1 and 10000"));
        }

        if self.gps.baud_rate == 0 {
            return Err(invalid("gps baud_rate must be greater than 0"));
        }

        if self.gps.max_lines_per_poll == 0 || self.gps.max_lines_per_poll > 1000 {
            return Err(invalid("max_lines_per_poll must be between 1 and 1000"));
        }

        // 7-bit I2C address
        if self.imu.address > 0x7F {
            return Err(invalid("imu address must be a 7-bit I2C address"));
        }

        if self.imu.settle_ms > 60000 {
            return Err(invalid("imu settle_ms must be at most 60000"));
        }

        if self.imu.enable_attempts == 0 {
            return Err(invalid("imu enable_attempts must be greater than 0"));
        }

        if self.imu.retry_backoff_ms > 60000 {
            return Err(invalid("imu retry_backoff_ms must be at most 60000"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> StormPodError {
    StormPodError::Config(toml::de::Error::custom(msg))
}
