//! # StormPOD
//!
//! Sensor acquisition daemon for the StormPOD mobile weather-monitoring unit.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, default `config/stormpod.toml`)
//!    - Set up logging, to stdout or a daily rolling file
//!    - Open the four devices; a device that fails to open is replaced by a
//!      source that contributes no fields
//!    - Start the lightning interrupt listener
//!
//! 2. **Main Loop**
//!    - Run one fusion cycle per poll interval and log a summary line
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Shutdown**
//!    - Join the interrupt listener and release the lightning sensor's bus
//!
//! # Examples
//!
//! ```bash
//! cargo run --release --features hardware -- config/stormpod.toml
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use stormpod::can::CanTelemetry;
use stormpod::config::{CanConfig, Config, DiagnosticsConfig, GpsConfig, ImuConfig, LightningConfig};
use stormpod::fusion::{FieldSource, FusionManager, Unavailable};
use stormpod::gps::{open_serial, GpsReceiver};
use linux_embedded_hal::SpidevDevice;
use stormpod::hardware::{open_imu_i2c, open_lightning_spi, GpioEdgeSource, SocketCanSource};
use stormpod::imu::{Bno08x, OrientationEstimator};
use stormpod::lightning::{As3935, IrqListener, LightningSource};
use stormpod::logger::open_sink;

const DEFAULT_CONFIG_PATH: &str = "config/stormpod.toml";

/// Lightning source plus the handles needed to shut the sensor down
struct Lightning {
    source: Box<dyn FieldSource>,
    sensor: Option<Arc<As3935<SpidevDevice>>>,
    listener: Option<IrqListener>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.diagnostics);

    info!("StormPOD v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let telemetry = open_telemetry(&config.can);
    let position = open_position(&config.gps);
    // The IRQ line owns a runtime of its own, which may not be dropped on a worker
    let lightning = tokio::task::block_in_place(|| open_lightning(&config.lightning));
    let orientation = open_orientation(&config.imu).await;

    let mut manager = FusionManager::new(telemetry, position, lightning.source, orientation);
    if config.logger.enabled {
        match open_sink(config.logger.format, &config.logger.path) {
            Ok(sink) => {
                info!(
                    "Logging snapshots to {} ({})",
                    config.logger.path.display(),
                    config.logger.format
                );
                manager = manager.with_sink(sink);
            }
            Err(e) => error!("Snapshot log unavailable: {}", e),
        }
    }

    let mut poll_interval = interval(config.poll_interval());

    info!("Polling sensors every {} ms", config.poll.interval_ms);
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                // Sources block on short device timeouts
                let snapshot = tokio::task::block_in_place(|| manager.poll_cycle());
                info!("{}", snapshot);
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("Total poll cycles: {}", manager.cycles());
                break;
            }
        }
    }

    drop(manager);
    tokio::task::block_in_place(|| shutdown_lightning(lightning.sensor, lightning.listener));

    Ok(())
}

/// Install the tracing subscriber
///
/// The returned guard flushes the non-blocking file writer on drop.
fn init_logging(diagnostics: &DiagnosticsConfig) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match &diagnostics.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "stormpod.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

fn open_telemetry(config: &CanConfig) -> Box<dyn FieldSource> {
    match SocketCanSource::open(&config.interface) {
        Ok(bus) => Box::new(CanTelemetry::new(
            bus,
            Duration::from_millis(config.read_timeout_ms),
        )),
        Err(e) => {
            error!("Telemetry disabled: {}", e);
            Box::new(Unavailable::new("can"))
        }
    }
}

fn open_position(config: &GpsConfig) -> Box<dyn FieldSource> {
    match open_serial(
        &config.port,
        config.baud_rate,
        Duration::from_millis(config.timeout_ms),
    ) {
        Ok(lines) => Box::new(GpsReceiver::new(lines, config.max_lines_per_poll)),
        Err(e) => {
            error!("GPS disabled: {}", e);
            Box::new(Unavailable::new("gps"))
        }
    }
}

fn open_lightning(config: &LightningConfig) -> Lightning {
    let sensor = match open_lightning_spi(&config.spi_path, config.spi_speed_hz)
        .and_then(|spi| As3935::new(spi, config.device_config()))
    {
        Ok(sensor) => Arc::new(sensor),
        Err(e) => {
            error!("Lightning sensor disabled: {}", e);
            return Lightning {
                source: Box::new(Unavailable::new("lightning")),
                sensor: None,
                listener: None,
            };
        }
    };

    match sensor.register_dump() {
        Ok(dump) => info!("AS3935 registers: {:?}", dump),
        Err(e) => warn!("AS3935 register read-back failed: {}", e),
    }

    // Without the listener the source still runs, it just never sees events
    let irq = GpioEdgeSource::open(&config.gpio_chip, config.irq_line)
        .and_then(|edges| IrqListener::spawn(Arc::clone(&sensor), edges, config.debounce()));
    let listener = match irq {
        Ok(listener) => Some(listener),
        Err(e) => {
            error!("Lightning interrupt listener not started: {}", e);
            None
        }
    };

    Lightning {
        source: Box::new(LightningSource::new(Arc::clone(&sensor))),
        sensor: Some(sensor),
        listener,
    }
}

/// Join the interrupt listener, then release the sensor's SPI device
///
/// Must run after the fusion manager, which holds the other sensor handle,
/// has been dropped.
fn shutdown_lightning(sensor: Option<Arc<As3935<SpidevDevice>>>, listener: Option<IrqListener>) {
    if let Some(listener) = listener {
        listener.stop();
        info!("Lightning interrupt listener stopped");
    }

    if let Some(sensor) = sensor {
        match Arc::try_unwrap(sensor) {
            Ok(sensor) => {
                drop(sensor.release());
                info!("Lightning sensor released");
            }
            Err(_) => warn!("Lightning sensor still in use at shutdown"),
        }
    }
}

async fn open_orientation(config: &ImuConfig) -> Box<dyn FieldSource> {
    let i2c = match open_imu_i2c(&config.i2c_path) {
        Ok(i2c) => i2c,
        Err(e) => {
            error!("IMU disabled: {}", e);
            return Box::new(Unavailable::new("imu"));
        }
    };

    // The BNO08x ignores commands until its boot sequence finishes
    tokio::time::sleep(Duration::from_millis(config.settle_ms)).await;

    let device = Bno08x::new(i2c, config.address);
    let attempts = config.enable_attempts;
    let backoff = Duration::from_millis(config.retry_backoff_ms);
    let estimator =
        tokio::task::block_in_place(|| OrientationEstimator::new(device, attempts, backoff));
    Box::new(estimator)
}
