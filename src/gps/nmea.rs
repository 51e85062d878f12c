//! # NMEA RMC Parser
//!
//! Parses `$GPRMC` / `$GNRMC` (recommended minimum) sentences into the
//! current position fix.
//!
//! ```text
//! $GPRMC,hhmmss.ss,A,ddmm.mmmm,N,dddmm.mmmm,E,speed,course,date,...*cs
//!  [0]     [1]    [2]  [3]    [4]   [5]    [6]  [7]    [8]
//! ```
//!
//! Heading rule: the course field is read from every recognized sentence,
//! valid fix or not. A numeric course replaces the heading, an empty or
//! non-numeric one clears it. A void status clears position and speed,
//! keeps the last fix time and leaves the heading to the course field.
//! Numbers must be finite: `nan` or `inf` count as non-numeric.

use crate::units::round_to;

/// Talker + type tags accepted as RMC sentences
pub const RMC_TAGS: [&str; 2] = ["$GPRMC", "$GNRMC"];

/// Knots to km/h
pub const KNOTS_TO_KPH: f64 = 1.852;

/// Field positions within an RMC sentence
const FIELD_TIME: usize = 1;
const FIELD_STATUS: usize = 2;
const FIELD_LAT: usize = 3;
const FIELD_LAT_HEMI: usize = 4;
const FIELD_LON: usize = 5;
const FIELD_LON_HEMI: usize = 6;
const FIELD_SPEED: usize = 7;
const FIELD_COURSE: usize = 8;

/// Position state maintained across sentences
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionFix {
    /// Whether the receiver reports a valid fix
    pub fix: bool,
    /// Latitude in decimal degrees (south negative)
    pub lat: Option<f64>,
    /// Longitude in decimal degrees (west negative)
    pub lon: Option<f64>,
    /// Ground speed in km/h, rounded to 0.01
    pub speed_kph: Option<f64>,
    /// Course over ground in degrees
    pub heading_deg: Option<f64>,
    /// UTC time of day, `hhmmss`
    pub time_utc: Option<String>,
}

/// Status-dependent part of an RMC sentence
#[derive(Debug, Clone, PartialEq)]
pub enum RmcStatus {
    /// `A`: valid fix
    Active {
        lat: Option<f64>,
        lon: Option<f64>,
        speed_kph: f64,
        time_utc: Option<String>,
    },
    /// `V` (or anything else): no fix
    Void,
}

/// One parsed RMC sentence
#[derive(Debug, Clone, PartialEq)]
pub struct RmcSentence {
    pub status: RmcStatus,
    /// Course over ground, `None` when empty or not numeric
    pub heading_deg: Option<f64>,
}

/// Parse one line
///
/// Returns `None` for lines that are not RMC sentences and for malformed
/// ones (too few fields, non-numeric coordinates or speed).
pub fn parse_rmc(line: &str) -> Option<RmcSentence> {
    let body = line.trim();
    let body = body.split_once('*').map_or(body, |(data, _checksum)| data);
    let fields: Vec<&str> = body.split(',').collect();

    if !RMC_TAGS.contains(&fields[0]) || fields.len() <= FIELD_STATUS {
        return None;
    }

    let status = if fields[FIELD_STATUS] == "A" {
        let lat = parse_coordinate(fields.get(FIELD_LAT)?, fields.get(FIELD_LAT_HEMI)?)?;
        let lon = parse_coordinate(fields.get(FIELD_LON)?, fields.get(FIELD_LON_HEMI)?)?;
        let knots = parse_finite(fields.get(FIELD_SPEED)?)?;
        let time_utc = fields
            .get(FIELD_TIME)
            .map(|t| t.chars().take(6).collect::<String>())
            .filter(|t| !t.is_empty());

        RmcStatus::Active {
            lat,
            lon,
            speed_kph: round_to(knots * KNOTS_TO_KPH, 2),
            time_utc,
        }
    } else {
        RmcStatus::Void
    };

    let heading_deg = fields
        .get(FIELD_COURSE)
        .and_then(|course| parse_finite(course));

    Some(RmcSentence { status, heading_deg })
}

/// Parse an NMEA coordinate (`ddmm.mmmm` or `dddmm.mmmm`) with hemisphere
///
/// The outer `Option` is `None` when the value is not numeric (malformed
/// sentence); the inner one is `None` when the field is empty or `0`.
pub fn parse_coordinate(raw: &str, hemisphere: &str) -> Option<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "0" {
        return Some(None);
    }

    let value = parse_finite(raw)?;
    let degrees = (value / 100.0).trunc();
    let minutes = value - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;

    match hemisphere.trim() {
        "S" | "W" => Some(Some(-decimal)),
        _ => Some(Some(decimal)),
    }
}

/// Parse a decimal field, rejecting `nan` and infinities
fn parse_finite(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl PositionFix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a parsed sentence
    pub fn apply(&mut self, sentence: RmcSentence) {
        match sentence.status {
            RmcStatus::Active {
                lat,
                lon,
                speed_kph,
                time_utc,
            } => {
                self.fix = true;
                self.lat = lat;
                self.lon = lon;
                self.speed_kph = Some(speed_kph);
                self.time_utc = time_utc;
            }
            RmcStatus::Void => {
                self.fix = false;
                self.lat = None;
                self.lon = None;
                self.speed_kph = None;
            }
        }
        self.heading_deg = sentence.heading_deg;
    }

    /// Parse a line and apply it
    ///
    /// Returns `false` when the line was ignored (not RMC, or malformed).
    pub fn update_from_line(&mut self, line: &str) -> bool {
        match parse_rmc(line) {
            Some(sentence) => {
                self.apply(sentence);
                true
            }
            None => false,
        }
    }
}
