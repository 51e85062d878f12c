//! # Linux Device Backends
//!
//! Opens the Raspberry Pi peripherals behind the crate's device seams:
//! spidev for the lightning sensor, a GPIO character device for its IRQ
//! line, SocketCAN for the telemetry bus and i2c-dev for the IMU.
//!
//! Only built with the `hardware` feature.

use gpio_cdev::{Chip, EventRequestFlags, LineEventHandle, LineRequestFlags};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{I2cdev, SpidevDevice};
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, Id, Socket};
use std::io;
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

use crate::can::{FrameSource, RawFrame};
use crate::error::{Result, StormPodError};
use crate::lightning::EdgeSource;

/// GPIO consumer label shown by `gpioinfo`
const GPIO_CONSUMER: &str = "stormpod-as3935";

/// Open the AS3935 SPI device (mode 1, 8-bit words)
pub fn open_lightning_spi(path: &str, speed_hz: u32) -> Result<SpidevDevice> {
    let mut spi = SpidevDevice::open(path)
        .map_err(|e| StormPodError::Bus(format!("Failed to open {}: {:?}", path, e)))?;

    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(speed_hz)
        .mode(SpiModeFlags::SPI_MODE_1)
        .build();
    spi.0
        .configure(&options)
        .map_err(|e| StormPodError::Bus(format!("Failed to configure {}: {}", path, e)))?;

    info!("Lightning sensor SPI opened at {} ({} Hz, mode 1)", path, speed_hz);
    Ok(spi)
}

/// Open the IMU I2C bus
pub fn open_imu_i2c(path: &str) -> Result<I2cdev> {
    let i2c = I2cdev::new(path)
        .map_err(|e| StormPodError::Bus(format!("Failed to open {}: {}", path, e)))?;
    info!("IMU I2C bus opened at {}", path);
    Ok(i2c)
}

/// Falling edges on a GPIO line
///
/// Waits on the line's event descriptor through a private single-threaded
/// runtime so each wait can time out. Must be dropped outside an async
/// context.
pub struct GpioEdgeSource {
    // Deregisters from the reactor, so it drops before the runtime
    events: AsyncFd<LineEventHandle>,
    runtime: Runtime,
}

impl GpioEdgeSource {
    pub fn open(chip_path: &str, line: u32) -> Result<Self> {
        let gpio_err =
            |e: gpio_cdev::Error| StormPodError::DeviceUnavailable(format!("GPIO {} line {}: {}", chip_path, line, e));

        let mut chip = Chip::new(chip_path).map_err(gpio_err)?;
        let events = chip
            .get_line(line)
            .and_then(|l| {
                l.events(
                    LineRequestFlags::INPUT,
                    EventRequestFlags::FALLING_EDGE,
                    GPIO_CONSUMER,
                )
            })
            .map_err(gpio_err)?;

        let runtime = Builder::new_current_thread().enable_io().enable_time().build()?;
        let events = {
            let _context = runtime.enter();
            AsyncFd::new(events)?
        };

        info!("Lightning IRQ on {} line {}", chip_path, line);
        Ok(Self { events, runtime })
    }
}

impl EdgeSource for GpioEdgeSource {
    fn wait_for_edge(&mut self, timeout: Duration) -> io::Result<bool> {
        let events = &mut self.events;
        self.runtime.block_on(async {
            let mut guard = match tokio::time::timeout(timeout, events.readable_mut()).await {
                Ok(guard) => guard?,
                Err(_elapsed) => return Ok(false),
            };
            let event = guard.get_inner_mut().get_event();
            guard.clear_ready();
            event
                .map(|_| true)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
        })
    }
}

/// SocketCAN telemetry bus
pub struct SocketCanSource {
    socket: CanSocket,
}

impl SocketCanSource {
    pub fn open(interface: &str) -> Result<Self> {
        let socket = CanSocket::open(interface).map_err(|e| {
            StormPodError::DeviceUnavailable(format!("CAN interface {}: {}", interface, e))
        })?;
        info!("Telemetry bus opened on {}", interface);
        Ok(Self { socket })
    }
}

fn raw_id(id: Id) -> u32 {
    match id {
        Id::Standard(id) => id.as_raw() as u32,
        Id::Extended(id) => id.as_raw(),
    }
}

impl FrameSource for SocketCanSource {
    fn recv(&mut self, timeout: Duration) -> io::Result<Option<RawFrame>> {
        match self.socket.read_frame_timeout(timeout) {
            Ok(CanFrame::Error(frame)) => {
                debug!("CAN error frame: {:?}", frame);
                Ok(None)
            }
            Ok(frame) => Ok(Some(RawFrame::new(
                raw_id(EmbeddedFrame::id(&frame)),
                EmbeddedFrame::data(&frame).to_vec(),
            ))),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_id() {
        let standard = Id::Standard(socketcan::StandardId::new(0x11).unwrap());
        assert_eq!(raw_id(standard), 0x11);

        let extended = Id::Extended(socketcan::ExtendedId::new(0x1234_5678).unwrap());
        assert_eq!(raw_id(extended), 0x1234_5678);
    }

    #[test]
    #[ignore = "requires a vcan0 interface"]
    fn test_idle_bus_times_out() {
        let mut bus = SocketCanSource::open("vcan0").unwrap();
        assert!(bus.recv(Duration::from_millis(10)).unwrap().is_none());
    }
}
