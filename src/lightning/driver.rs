//! # AS3935 Driver
//!
//! Register access, initialization and interrupt decoding for the AS3935
//! lightning sensor over SPI (mode 1).
//!
//! The driver is shared between the poll loop and the interrupt listener
//! (`Arc<As3935<_>>`). Bus access goes through one mutex so an interrupt
//! never interleaves with a poll-loop register transaction, and the pending
//! event lives in an [`EventSlot`] so read-and-clear and interrupt-write are
//! each atomic with respect to the other.

use chrono::Utc;
use embedded_hal::spi::SpiDevice;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use super::event::{EventKind, EventSlot, LightningEvent};
use super::registers::*;
use crate::error::{Result, StormPodError};

/// Minimum wait between the calibration start and stop commands
pub const CALIBRATION_DELAY: Duration = Duration::from_millis(2);

/// Register values read back after initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDump {
    pub afe_gain: u8,
    pub noise_watchdog: u8,
    pub spike_rejection: u8,
    pub interrupt_mask: u8,
}

/// AS3935 lightning sensor handle
pub struct As3935<SPI> {
    bus: Mutex<SPI>,
    pending: EventSlot,
    config: DeviceConfig,
}

impl<SPI> std::fmt::Debug for As3935<SPI> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("As3935")
            .field("config", &self.config)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl<SPI: SpiDevice> As3935<SPI> {
    /// Take ownership of the SPI device and run the initialization sequence
    ///
    /// Initialization runs exactly once, before any interrupt listener is
    /// attached:
    ///
    /// 1. Resonator calibration pulse (raw `[0x3D, 0x96]`, ≥2 ms, `[0x3D, 0x16]`)
    /// 2. AFE gain for the configured mode
    /// 3. Noise floor / watchdog, packed and masked
    /// 4. Spike rejection, masked
    /// 5. Interrupt mask cleared so all three sources fire
    ///
    /// # Errors
    ///
    /// Returns `StormPodError::Bus` if any SPI transaction fails.
    pub fn new(spi: SPI, config: DeviceConfig) -> Result<Self> {
        let sensor = Self {
            bus: Mutex::new(spi),
            pending: EventSlot::new(),
            config,
        };
        sensor.init_sensor()?;
        info!(
            "AS3935 initialized ({} mode, noise floor {}, watchdog {}, spike rejection {})",
            config.mode,
            config.noise_floor & NOISE_FLOOR_MASK,
            config.watchdog & WATCHDOG_MASK,
            config.spike_rejection & SPIKE_REJECTION_MASK
        );
        Ok(sensor)
    }

    /// Configuration the sensor was initialized with
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Write a register (address and data masked to 6 bits)
    pub fn write_register(&self, reg: u8, value: u8) -> Result<()> {
        let mut spi = self.lock_bus();
        Self::write_locked(&mut spi, reg, value)
    }

    /// Read a register
    pub fn read_register(&self, reg: u8) -> Result<u8> {
        let mut spi = self.lock_bus();
        Self::read_locked(&mut spi, reg)
    }

    /// Decode one interrupt
    ///
    /// Reads the interrupt source, classifies it (reading the distance
    /// register for lightning) and stores the event as the pending one,
    /// replacing any event not yet consumed.
    ///
    /// # Errors
    ///
    /// On a bus failure the invocation is abandoned and no event is stored.
    pub fn handle_interrupt(&self) -> Result<LightningEvent> {
        let kind = {
            let mut spi = self.lock_bus();
            let source = Self::read_locked(&mut spi, REG_INTERRUPT)? & INTERRUPT_SOURCE_MASK;
            if source == super::event::IRQ_LIGHTNING {
                let distance = Self::read_locked(&mut spi, REG_DISTANCE)?;
                EventKind::classify(source, || distance)
            } else {
                EventKind::classify(source, || 0)
            }
        };

        let event = LightningEvent::new(kind, Utc::now());
        if let Some(dropped) = self.pending.store(event) {
            debug!("Unconsumed lightning event replaced: {:?}", dropped.kind);
        }
        Ok(event)
    }

    /// Take and clear the pending event
    ///
    /// Only the most recent interrupt survives until this call: two
    /// interrupts between calls leave just the second one.
    pub fn read_event(&self) -> Option<LightningEvent> {
        self.pending.take()
    }

    /// Read back the configuration registers
    pub fn register_dump(&self) -> Result<RegisterDump> {
        let mut spi = self.lock_bus();
        Ok(RegisterDump {
            afe_gain: Self::read_locked(&mut spi, REG_AFE_GAIN)?,
            noise_watchdog: Self::read_locked(&mut spi, REG_NOISE_WATCHDOG)?,
            spike_rejection: Self::read_locked(&mut spi, REG_SPIKE_REJECTION)?,
            interrupt_mask: Self::read_locked(&mut spi, REG_INTERRUPT_MASK)?,
        })
    }

    /// Release the SPI device
    pub fn release(self) -> SPI {
        self.bus.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_sensor(&self) -> Result<()> {
        let mut spi = self.lock_bus();

        Self::transfer(&mut spi, CALIBRATION_START)?;
        thread::sleep(CALIBRATION_DELAY);
        Self::transfer(&mut spi, CALIBRATION_STOP)?;

        Self::write_locked(&mut spi, REG_AFE_GAIN, self.config.mode.gain())?;
        Self::write_locked(&mut spi, REG_NOISE_WATCHDOG, self.config.noise_watchdog_byte())?;
        Self::write_locked(&mut spi, REG_SPIKE_REJECTION, self.config.spike_rejection_byte())?;
        Self::write_locked(&mut spi, REG_INTERRUPT_MASK, INTERRUPT_MASK_NONE)?;

        Ok(())
    }

    fn lock_bus(&self) -> std::sync::MutexGuard<'_, SPI> {
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_locked(spi: &mut SPI, reg: u8, value: u8) -> Result<()> {
        Self::transfer(spi, encode_write(reg, value)).map(|_| ())
    }

    fn read_locked(spi: &mut SPI, reg: u8) -> Result<u8> {
        Self::transfer(spi, encode_read(reg)).map(|response| response[1])
    }

    fn transfer(spi: &mut SPI, command: [u8; 2]) -> Result<[u8; 2]> {
        let mut words = command;
        spi.transfer_in_place(&mut words).map_err(|e| {
            StormPodError::Bus(format!(
                "SPI transfer [0x{:02X}, 0x{:02X}] failed: {:?}",
                command[0], command[1], e
            ))
        })?;
        Ok(words)
    }
}

#[cfg(test)]
pub(crate) mod mocks {
    use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Mock SPI device emulating the AS3935 register file
    #[derive(Clone, Default)]
    pub struct MockSpi {
        pub transfers: Arc<Mutex<Vec<[u8; 2]>>>,
        pub registers: Arc<Mutex<HashMap<u8, u8>>>,
        pub fail: Arc<Mutex<bool>>,
    }

    impl MockSpi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_transfers(&self) -> Vec<[u8; 2]> {
            self.transfers.lock().unwrap().clone()
        }

        pub fn clear_transfers(&self) {
            self.transfers.lock().unwrap().clear();
        }

        /// Value returned by subsequent reads of `reg`
        pub fn set_register(&self, reg: u8, value: u8) {
            self.registers.lock().unwrap().insert(reg, value);
        }

        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }
    }

    impl ErrorType for MockSpi {
        type Error = ErrorKind;
    }

    impl SpiDevice for MockSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
            if *self.fail.lock().unwrap() {
                return Err(ErrorKind::Other);
            }
            for op in operations.iter_mut() {
                if let Operation::TransferInPlace(words) = op {
                    let command = [words[0], words[1]];
                    self.transfers.lock().unwrap().push(command);
                    if command[0] & 0x40 != 0 {
                        let reg = command[0] & 0x3F;
                        words[1] = self.registers.lock().unwrap().get(&reg).copied().unwrap_or(0);
                    } else {
                        self.registers
                            .lock()
                            .unwrap()
                            .insert(command[0] & 0x3F, command[1]);
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::MockSpi;
    use super::*;

    fn sensor_with(config: DeviceConfig) -> (As3935<MockSpi>, MockSpi) {
        let spi = MockSpi::new();
        let sensor = As3935::new(spi.clone(), config).unwrap();
        (sensor, spi)
    }

    #[test]
    fn test_init_sequence_outdoor() {
        let (_sensor, spi) = sensor_with(DeviceConfig::default());
        assert_eq!(
            spi.get_transfers(),
            vec![
                [0x3D, 0x96],
                [0x3D, 0x16],
                [0x00, 0x12],
                [0x01, 0x22],
                [0x02, 0x02],
                [0x08, 0x00],
            ]
        );
    }

    #[test]
    fn test_init_sequence_indoor_masks_values() {
        let config = DeviceConfig {
            mode: AfeMode::Indoor,
            noise_floor: 0x0F,
            watchdog: 0x1F,
            spike_rejection: 0x13,
        };
        let (_sensor, spi) = sensor_with(config);
        let transfers = spi.get_transfers();
        assert_eq!(transfers[2], [0x00, 0x0E]);
        // (0x0F & 0x07) << 4 | (0x1F & 0x0F) = 0x7F, then 6-bit data mask
        assert_eq!(transfers[3], [0x01, 0x7F & 0x3F]);
        assert_eq!(transfers[4], [0x02, 0x03]);
    }

    #[test]
    fn test_read_register_encoding() {
        let (sensor, spi) = sensor_with(DeviceConfig::default());
        spi.clear_transfers();
        spi.set_register(0x07, 0x2A);

        assert_eq!(sensor.read_register(0x07).unwrap(), 0x2A);
        assert_eq!(spi.get_transfers(), vec![[0x47, 0x00]]);
    }

    #[test]
    fn test_lightning_interrupt() {
        let (sensor, spi) = sensor_with(DeviceConfig::default());
        spi.set_register(REG_INTERRUPT, 0xF8); // upper bits ignored
        spi.set_register(REG_DISTANCE, 0xCE); // 0xCE & 0x3F = 14

        let event = sensor.handle_interrupt().unwrap();
        assert_eq!(event.kind, EventKind::Lightning { distance_km: 14 });
        assert_eq!(sensor.read_event().map(|e| e.kind), Some(EventKind::Lightning { distance_km: 14 }));
        assert!(sensor.read_event().is_none());
    }

    #[test]
    fn test_noise_and_disturber_skip_distance_read() {
        let (sensor, spi) = sensor_with(DeviceConfig::default());

        spi.set_register(REG_INTERRUPT, 0x01);
        spi.clear_transfers();
        assert_eq!(sensor.handle_interrupt().unwrap().kind, EventKind::Noise);
        assert_eq!(spi.get_transfers(), vec![[0x43, 0x00]]);

        spi.set_register(REG_INTERRUPT, 0x04);
        assert_eq!(sensor.handle_interrupt().unwrap().kind, EventKind::Disturber);

        spi.set_register(REG_INTERRUPT, 0x02);
        assert_eq!(sensor.handle_interrupt().unwrap().kind, EventKind::Unknown);
    }

    #[test]
    fn test_second_interrupt_overwrites_first() {
        let (sensor, spi) = sensor_with(DeviceConfig::default());

        spi.set_register(REG_INTERRUPT, 0x01);
        sensor.handle_interrupt().unwrap();
        spi.set_register(REG_INTERRUPT, 0x08);
        spi.set_register(REG_DISTANCE, 20);
        sensor.handle_interrupt().unwrap();

        assert_eq!(
            sensor.read_event().map(|e| e.kind),
            Some(EventKind::Lightning { distance_km: 20 })
        );
        assert!(sensor.read_event().is_none());
        assert!(sensor.read_event().is_none());
    }

    #[test]
    fn test_bus_failure_leaves_no_event() {
        let (sensor, spi) = sensor_with(DeviceConfig::default());
        spi.set_fail(true);

        let result = sensor.handle_interrupt();
        assert!(matches!(result, Err(StormPodError::Bus(_))));
        assert!(sensor.read_event().is_none());
    }

    #[test]
    fn test_init_failure_propagates() {
        let spi = MockSpi::new();
        spi.set_fail(true);
        assert!(As3935::new(spi, DeviceConfig::default()).is_err());
    }

    #[test]
    fn test_register_dump_after_init() {
        let (sensor, _spi) = sensor_with(DeviceConfig::default());
        let dump = sensor.register_dump().unwrap();
        assert_eq!(
            dump,
            RegisterDump {
                afe_gain: 0x12,
                noise_watchdog: 0x22,
                spike_rejection: 0x02,
                interrupt_mask: 0x00,
            }
        );
    }

    #[test]
    fn test_release_returns_device() {
        let (sensor, spi) = sensor_with(DeviceConfig::default());
        let released = sensor.release();
        assert_eq!(released.get_transfers().len(), spi.get_transfers().len());
    }
}
