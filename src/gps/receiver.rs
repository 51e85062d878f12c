//! # GPS Receiver
//!
//! Reads NMEA lines from the GPS serial port and keeps the current fix.
//!
//! Each poll reads a bounded number of lines so the port's receive buffer
//! keeps draining without the poll blocking for long. A read timeout ends
//! the batch early.

use std::io::{self, BufRead, BufReader, Read};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::nmea::PositionFix;
use crate::error::{Result, StormPodError};
use crate::fusion::{FieldSource, Snapshot};

/// Default GPS baud rate
pub const GPS_BAUD_RATE: u32 = 38_400;

/// Default per-line read timeout
pub const DEFAULT_LINE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of line reads per poll
pub const DEFAULT_MAX_LINES_PER_POLL: usize = 10;

/// Longest line kept before the buffer is discarded as garbage
const MAX_LINE_LENGTH: usize = 512;

/// Keys published from the current fix
pub const POSITION_FIELDS: &[&str] = &["time_utc", "fix", "lat", "lon", "speed_kph", "heading_deg"];

/// A line-oriented stream
pub trait LineSource: Send {
    /// Read one line; `Ok(None)` when nothing complete arrived in time
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Line source over any byte stream with a read timeout
///
/// Partial lines cut off by a timeout are kept and completed by the next
/// read. Bytes are decoded lossily and the line is trimmed. A line longer
/// than `MAX_LINE_LENGTH` is dropped up to its terminating newline, so the
/// buffer stays bounded and each call reads a bounded amount.
pub struct StreamLineSource<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    discarding: bool,
}

impl<R: Read> StreamLineSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::with_capacity(128),
            discarding: false,
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        line
    }
}

impl<R: Read + Send> LineSource for StreamLineSource<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        loop {
            let available = match self.reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    return Ok(None)
                }
                Err(e) => return Err(e),
            };

            // End of stream
            if available.is_empty() {
                if self.pending.is_empty() || self.discarding {
                    self.pending.clear();
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            let newline = available.iter().position(|&b| b == b'\n');

            if self.discarding {
                let used = newline.map_or(available.len(), |i| i + 1);
                self.reader.consume(used);
                if newline.is_some() {
                    self.discarding = false;
                    continue;
                }
                return Ok(None);
            }

            let room = MAX_LINE_LENGTH + 1 - self.pending.len();
            match newline {
                Some(i) if i < room => {
                    self.pending.extend_from_slice(&available[..i + 1]);
                    self.reader.consume(i + 1);
                    return Ok(Some(self.take_line()));
                }
                _ => {
                    let used = available.len().min(room);
                    self.pending.extend_from_slice(&available[..used]);
                    self.reader.consume(used);
                }
            }

            if self.pending.len() > MAX_LINE_LENGTH {
                debug!("Discarding {} bytes without a line break", self.pending.len());
                self.pending.clear();
                self.discarding = true;
                return Ok(None);
            }
        }
    }
}

/// Serial-port line source
pub type SerialLineSource = StreamLineSource<Box<dyn tokio_serial::SerialPort>>;

/// Open the GPS serial port (8N1) with a per-read timeout
///
/// # Errors
///
/// Returns `StormPodError::Serial` if the port cannot be opened.
pub fn open_serial(path: &str, baud_rate: u32, timeout: Duration) -> Result<SerialLineSource> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(timeout)
        .open()
        .map_err(|e| StormPodError::Serial(format!("Failed to open {}: {}", path, e)))?;

    info!("GPS serial port opened at {} ({} baud)", path, baud_rate);
    Ok(StreamLineSource::new(port))
}

/// GPS position receiver
pub struct GpsReceiver<L> {
    lines: L,
    max_lines: usize,
    fix: PositionFix,
}

impl<L: LineSource> GpsReceiver<L> {
    pub fn new(lines: L, max_lines: usize) -> Self {
        Self {
            lines,
            max_lines,
            fix: PositionFix::new(),
        }
    }

    /// Read up to `max_lines` lines and apply each recognized sentence
    ///
    /// Returns the number of sentences applied.
    pub fn update(&mut self) -> usize {
        let mut applied = 0;
        for _ in 0..self.max_lines {
            match self.lines.read_line() {
                Ok(Some(line)) => {
                    if self.fix.update_from_line(&line) {
                        applied += 1;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("GPS read failed: {}", e);
                    break;
                }
            }
        }
        applied
    }

    /// Current fix state
    pub fn fix(&self) -> &PositionFix {
        &self.fix
    }

    /// Fields for the current fix
    pub fn fields(&self) -> Snapshot {
        Snapshot {
            fix: Some(self.fix.fix),
            lat: self.fix.lat,
            lon: self.fix.lon,
            speed_kph: self.fix.speed_kph,
            heading_deg: self.fix.heading_deg,
            time_utc: self.fix.time_utc.clone(),
            ..Snapshot::default()
        }
    }
}

impl<L: LineSource> FieldSource for GpsReceiver<L> {
    fn name(&self) -> &'static str {
        "gps"
    }

    fn owned_fields(&self) -> &'static [&'static str] {
        POSITION_FIELDS
    }

    fn read_fields(&mut self) -> Snapshot {
        self.update();
        self.fields()
    }
}

#[cfg(test)]
pub(crate) mod mocks {
    use super::*;
    use std::collections::VecDeque;

    /// Line source replaying a fixed script, then reporting timeouts
    #[derive(Default)]
    pub struct ScriptedLines {
        pub script: VecDeque<io::Result<Option<String>>>,
        pub reads: usize,
    }

    impl ScriptedLines {
        pub fn new(script: Vec<io::Result<Option<String>>>) -> Self {
            Self {
                script: script.into(),
                reads: 0,
            }
        }

        pub fn lines(lines: &[&str]) -> Self {
            Self::new(lines.iter().map(|l| Ok(Some(l.to_string()))).collect())
        }
    }

    impl LineSource for ScriptedLines {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            self.reads += 1;
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }
}
