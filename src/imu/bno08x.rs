//! # BNO08x Driver
//!
//! Minimal SHTP (Sensor Hub Transport Protocol) client for the BNO08x IMU
//! over I2C, enough to enable and read the rotation vector.
//!
//! ## Packet layout
//!
//! ```text
//! [len LSB][len MSB | continuation][channel][sequence][payload...]
//! ```
//!
//! The length includes the 4-byte header. Feature configuration goes out on
//! the SH-2 control channel; sensor reports arrive on the input-report
//! channel, each batch led by a base-timestamp record.

use embedded_hal::i2c::I2c;
use std::thread;
use std::time::Duration;
use tracing::debug;

use super::orientation::{Quaternion, QuaternionSource};
use crate::error::{Result, StormPodError};

/// Default I2C address (SA0 high)
pub const BNO08X_DEFAULT_ADDRESS: u8 = 0x4B;

/// SH-2 control channel
pub const CHANNEL_CONTROL: u8 = 2;

/// Normal input-report channel
pub const CHANNEL_REPORTS: u8 = 3;

/// Set Feature command
pub const REPORT_SET_FEATURE: u8 = 0xFD;

/// Get Feature response
pub const REPORT_GET_FEATURE_RESPONSE: u8 = 0xFC;

/// Base timestamp reference record
pub const REPORT_BASE_TIMESTAMP: u8 = 0xFB;

/// Timestamp rebase record
pub const REPORT_TIMESTAMP_REBASE: u8 = 0xFA;

/// Rotation vector report
pub const REPORT_ROTATION_VECTOR: u8 = 0x05;

/// Rotation-vector report interval requested from the sensor
pub const ROTATION_VECTOR_INTERVAL_US: u32 = 100_000;

/// Fixed-point exponent of rotation-vector components
const ROTATION_VECTOR_Q_POINT: i32 = 14;

const HEADER_LEN: usize = 4;
const TIMESTAMP_RECORD_LEN: usize = 5;
const ROTATION_VECTOR_LEN: usize = 14;
const MAX_PACKET_LEN: usize = 512;

/// Packets drained per rotation-vector read
const MAX_PACKETS_PER_READ: usize = 10;

/// Polls while waiting for the Get Feature response
const FEATURE_RESPONSE_POLLS: usize = 20;
const FEATURE_RESPONSE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// One received SHTP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShtpPacket {
    pub channel: u8,
    pub sequence: u8,
    pub payload: Vec<u8>,
}

/// BNO08x over I2C
pub struct Bno08x<I2C> {
    i2c: I2C,
    address: u8,
    sequence: [u8; 6],
}

impl<I2C: I2c> Bno08x<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            sequence: [0; 6],
        }
    }

    /// Send a payload on a channel
    pub fn send(&mut self, channel: u8, payload: &[u8]) -> Result<()> {
        let length = (payload.len() + HEADER_LEN) as u16;
        let slot = (channel as usize).min(self.sequence.len() - 1);
        let sequence = self.sequence[slot];
        self.sequence[slot] = sequence.wrapping_add(1);

        let mut packet = Vec::with_capacity(length as usize);
        packet.extend_from_slice(&length.to_le_bytes());
        packet.push(channel);
        packet.push(sequence);
        packet.extend_from_slice(payload);

        self.i2c
            .write(self.address, &packet)
            .map_err(|e| StormPodError::Bus(format!("BNO08x write failed: {:?}", e)))
    }

    /// Receive one packet, `None` when the sensor has nothing queued
    pub fn receive(&mut self) -> Result<Option<ShtpPacket>> {
        let mut header = [0u8; HEADER_LEN];
        self.read(&mut header)?;

        let raw_length = u16::from_le_bytes([header[0], header[1]]);
        if raw_length == 0xFFFF {
            return Ok(None);
        }
        let length = (raw_length & 0x7FFF) as usize;
        if length <= HEADER_LEN {
            return Ok(None);
        }

        let mut packet = vec![0u8; length.min(MAX_PACKET_LEN)];
        self.read(&mut packet)?;
        if length > MAX_PACKET_LEN {
            debug!("Skipping oversized SHTP packet ({} bytes)", length);
            return Ok(None);
        }

        Ok(Some(ShtpPacket {
            channel: packet[2],
            sequence: packet[3],
            payload: packet[HEADER_LEN..].to_vec(),
        }))
    }

    /// Release the I2C bus
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.i2c
            .read(self.address, buffer)
            .map_err(|e| StormPodError::Bus(format!("BNO08x read failed: {:?}", e)))
    }
}

/// Set Feature command enabling a report at an interval
pub fn set_feature_command(report_id: u8, interval_us: u32) -> [u8; 17] {
    let mut command = [0u8; 17];
    command[0] = REPORT_SET_FEATURE;
    command[1] = report_id;
    command[5..9].copy_from_slice(&interval_us.to_le_bytes());
    command
}

/// Extract the last rotation vector from an input-report payload
pub fn parse_rotation_vector(payload: &[u8]) -> Option<Quaternion> {
    let mut latest = None;
    let mut cursor = 0;

    while cursor < payload.len() {
        let rest = &payload[cursor..];
        match rest[0] {
            REPORT_BASE_TIMESTAMP | REPORT_TIMESTAMP_REBASE => cursor += TIMESTAMP_RECORD_LEN,
            REPORT_ROTATION_VECTOR if rest.len() >= ROTATION_VECTOR_LEN => {
                let component = |offset: usize| {
                    let raw = i16::from_le_bytes([rest[offset], rest[offset + 1]]);
                    raw as f64 / 2f64.powi(ROTATION_VECTOR_Q_POINT)
                };
                latest = Some(Quaternion {
                    x: component(4),
                    y: component(6),
                    z: component(8),
                    w: component(10),
                });
                cursor += ROTATION_VECTOR_LEN;
            }
            other => {
                debug!("Unhandled SHTP report 0x{:02X}", other);
                break;
            }
        }
    }

    latest
}

impl<I2C: I2c + Send> QuaternionSource for Bno08x<I2C> {
    fn enable_rotation_vector(&mut self) -> Result<()> {
        self.send(
            CHANNEL_CONTROL,
            &set_feature_command(REPORT_ROTATION_VECTOR, ROTATION_VECTOR_INTERVAL_US),
        )?;

        for _ in 0..FEATURE_RESPONSE_POLLS {
            match self.receive()? {
                Some(packet)
                    if packet.channel == CHANNEL_CONTROL
                        && packet.payload.first() == Some(&REPORT_GET_FEATURE_RESPONSE)
                        && packet.payload.get(1) == Some(&REPORT_ROTATION_VECTOR) =>
                {
                    return Ok(());
                }
                Some(packet) => debug!("Ignoring SHTP packet on channel {}", packet.channel),
                None => thread::sleep(FEATURE_RESPONSE_POLL_INTERVAL),
            }
        }

        Err(StormPodError::DeviceUnavailable(
            "BNO08x did not confirm rotation vector".to_string(),
        ))
    }

    fn rotation_vector(&mut self) -> Result<Option<Quaternion>> {
        let mut latest = None;
        for _ in 0..MAX_PACKETS_PER_READ {
            match self.receive()? {
                Some(packet) if packet.channel == CHANNEL_REPORTS => {
                    if let Some(q) = parse_rotation_vector(&packet.payload) {
                        latest = Some(q);
                    }
                }
                Some(_) => {}
                None => break,
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
pub(crate) mod mocks {
    use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};
    use std::collections::VecDeque;

    /// Mock I2C bus serving queued SHTP packets
    ///
    /// A 4-byte read peeks at the next packet's header, a longer read
    /// consumes the packet, matching how the sensor repeats the header.
    #[derive(Default)]
    pub struct MockI2c {
        pub packets: VecDeque<Vec<u8>>,
        pub writes: Vec<(u8, Vec<u8>)>,
        pub fail: bool,
    }

    impl MockI2c {
        pub fn queue(&mut self, channel: u8, payload: &[u8]) {
            let length = (payload.len() + 4) as u16;
            let mut packet = length.to_le_bytes().to_vec();
            packet.push(channel);
            packet.push(0);
            packet.extend_from_slice(payload);
            self.packets.push_back(packet);
        }
    }

    impl ErrorType for MockI2c {
        type Error = ErrorKind;
    }

    impl I2c for MockI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(data) => self.writes.push((address, data.to_vec())),
                    Operation::Read(buffer) => {
                        buffer.fill(0);
                        let packet = if buffer.len() <= 4 {
                            self.packets.front().cloned()
                        } else {
                            self.packets.pop_front()
                        };
                        if let Some(packet) = packet {
                            let n = buffer.len().min(packet.len());
                            buffer[..n].copy_from_slice(&packet[..n]);
                        }
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::MockI2c;
    use super::*;

    fn rotation_report(i: i16, j: i16, k: i16, real: i16) -> Vec<u8> {
        let mut payload = vec![REPORT_BASE_TIMESTAMP, 0, 0, 0, 0];
        payload.extend_from_slice(&[REPORT_ROTATION_VECTOR, 1, 3, 0]);
        for v in [i, j, k, real, 0] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        payload
    }

    #[test]
    fn test_set_feature_command_layout() {
        let command = set_feature_command(0x05, 100_000);
        assert_eq!(command[0], 0xFD);
        assert_eq!(command[1], 0x05);
        assert_eq!(&command[5..9], &[0xA0, 0x86, 0x01, 0x00]);
        assert!(command[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_send_header_and_sequence() {
        let mut imu = Bno08x::new(MockI2c::default(), BNO08X_DEFAULT_ADDRESS);
        imu.send(CHANNEL_CONTROL, &[0xAA, 0xBB]).unwrap();
        imu.send(CHANNEL_CONTROL, &[0xCC]).unwrap();

        let bus = imu.release();
        assert_eq!(bus.writes[0], (0x4B, vec![6, 0, 2, 0, 0xAA, 0xBB]));
        assert_eq!(bus.writes[1], (0x4B, vec![5, 0, 2, 1, 0xCC]));
    }

    #[test]
    fn test_receive_empty_bus() {
        let mut imu = Bno08x::new(MockI2c::default(), BNO08X_DEFAULT_ADDRESS);
        assert_eq!(imu.receive().unwrap(), None);
    }

    #[test]
    fn test_receive_packet() {
        let mut bus = MockI2c::default();
        bus.queue(CHANNEL_REPORTS, &[1, 2, 3]);
        let mut imu = Bno08x::new(bus, BNO08X_DEFAULT_ADDRESS);

        let packet = imu.receive().unwrap().unwrap();
        assert_eq!(packet.channel, CHANNEL_REPORTS);
        assert_eq!(packet.payload, vec![1, 2, 3]);
        assert_eq!(imu.receive().unwrap(), None);
    }

    #[test]
    fn test_parse_rotation_vector_q14() {
        // real = 1.0 (16384), i = j = k = 0
        let q = parse_rotation_vector(&rotation_report(0, 0, 0, 16384)).unwrap();
        assert_eq!(q, Quaternion::new(1.0, 0.0, 0.0, 0.0));

        // 90° yaw: real = k = 0.7071
        let q = parse_rotation_vector(&rotation_report(0, 0, 11585, 11585)).unwrap();
        assert!((q.heading_deg() - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_rotation_vector_ignores_other_reports() {
        assert_eq!(parse_rotation_vector(&[REPORT_BASE_TIMESTAMP, 0, 0, 0, 0]), None);
        assert_eq!(parse_rotation_vector(&[0x01, 0, 0, 0]), None);
        // Truncated rotation report
        assert_eq!(parse_rotation_vector(&[REPORT_ROTATION_VECTOR, 0, 0, 0, 1, 2]), None);
    }

    #[test]
    fn test_enable_waits_for_feature_response() {
        let mut bus = MockI2c::default();
        bus.queue(0, &[0x00, 0x01]); // advertisement noise
        bus.queue(CHANNEL_CONTROL, &[REPORT_GET_FEATURE_RESPONSE, REPORT_ROTATION_VECTOR, 0]);
        let mut imu = Bno08x::new(bus, BNO08X_DEFAULT_ADDRESS);

        imu.enable_rotation_vector().unwrap();

        let bus = imu.release();
        assert_eq!(bus.writes.len(), 1);
        assert_eq!(bus.writes[0].1[2], CHANNEL_CONTROL);
        assert_eq!(bus.writes[0].1[4], REPORT_SET_FEATURE);
    }

    #[test]
    fn test_enable_without_response_fails() {
        let mut imu = Bno08x::new(MockI2c::default(), BNO08X_DEFAULT_ADDRESS);
        assert!(matches!(
            imu.enable_rotation_vector(),
            Err(StormPodError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_rotation_vector_returns_latest() {
        let mut bus = MockI2c::default();
        bus.queue(CHANNEL_REPORTS, &rotation_report(0, 0, 0, 16384));
        bus.queue(CHANNEL_REPORTS, &rotation_report(0, 0, 11585, 11585));
        let mut imu = Bno08x::new(bus, BNO08X_DEFAULT_ADDRESS);

        let q = imu.rotation_vector().unwrap().unwrap();
        assert!((q.heading_deg() - 90.0).abs() < 0.01);
        assert_eq!(imu.rotation_vector().unwrap(), None);
    }

    #[test]
    fn test_bus_error_propagates() {
        let bus = MockI2c {
            fail: true,
            ..MockI2c::default()
        };
        let mut imu = Bno08x::new(bus, BNO08X_DEFAULT_ADDRESS);
        assert!(matches!(imu.rotation_vector(), Err(StormPodError::Bus(_))));
    }
}
