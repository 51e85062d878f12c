//! # Snapshot
//!
//! The merged, timestamped view of all sensor state produced once per poll
//! cycle. The same type carries each source's partial field set: a field is
//! either present (`Some`) or absent (`None`), with no per-source
//! namespacing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Column order of the persisted record
pub const COLUMNS: [&str; 14] = [
    "time_utc",
    "temp_C",
    "humidity_%",
    "pressure_hPa",
    "altitude_m",
    "wind_raw",
    "wind_volts",
    "speed_kph",
    "fix",
    "lat",
    "lon",
    "heading_deg",
    "lightning",
    "distance_km",
];

/// Flat field set keyed by the persisted column names
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_utc: Option<String>,

    #[serde(rename = "temp_C", skip_serializing_if = "Option::is_none")]
    pub temp_c: Option<f64>,

    #[serde(rename = "humidity_%", skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f64>,

    #[serde(rename = "pressure_hPa", skip_serializing_if = "Option::is_none")]
    pub pressure_hpa: Option<f64>,

    /// Wind vane direction in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_deg: Option<f64>,

    /// Anemometer ADC counts (0-1023)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_raw: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_volts: Option<f64>,

    /// Wind speed from telemetry, replaced by ground speed when the
    /// position source reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_kph: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lightning: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disturber: Option<bool>,

    /// Capture time of the lightning-sensor event reported this cycle
    #[serde(rename = "timestamp", skip_serializing_if = "Option::is_none")]
    pub event_timestamp: Option<DateTime<Utc>>,
}

macro_rules! overlay_fields {
    ($dst:ident, $src:ident, $($field:ident),+ $(,)?) => {
        $(
            if $src.$field.is_some() {
                $dst.$field = $src.$field;
            }
        )+
    };
}

impl Snapshot {
    /// Empty field set
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `other` on top of `self`: every field present in `other`
    /// replaces the one here, absent fields leave `self` untouched
    pub fn overlay(&mut self, other: Snapshot) {
        let dst = self;
        overlay_fields!(
            dst, other,
            time_utc, temp_c, humidity_pct, pressure_hpa, angle_deg,
            wind_raw, wind_volts, speed_kph, fix, lat, lon, heading_deg,
            lightning, distance_km, noise, disturber, event_timestamp,
        );
    }

    /// Remove a field by its serialized key
    ///
    /// Returns `false` for a key that names no field.
    pub fn clear(&mut self, key: &str) -> bool {
        match key {
            "time_utc" => self.time_utc = None,
            "temp_C" => self.temp_c = None,
            "humidity_%" => self.humidity_pct = None,
            "pressure_hPa" => self.pressure_hpa = None,
            "angle_deg" => self.angle_deg = None,
            "wind_raw" => self.wind_raw = None,
            "wind_volts" => self.wind_volts = None,
            "speed_kph" => self.speed_kph = None,
            "fix" => self.fix = None,
            "lat" => self.lat = None,
            "lon" => self.lon = None,
            "heading_deg" => self.heading_deg = None,
            "lightning" => self.lightning = None,
            "distance_km" => self.distance_km = None,
            "noise" => self.noise = None,
            "disturber" => self.disturber = None,
            "timestamp" => self.event_timestamp = None,
            _ => return false,
        }
        true
    }

    /// True when no field is present
    pub fn is_empty(&self) -> bool {
        *self == Snapshot::default()
    }

    /// Text value of a persisted column, `None` when the field is absent
    ///
    /// `altitude_m` has no producing source and is always absent.
    pub fn column(&self, name: &str) -> Option<String> {
        match name {
            "time_utc" => self.time_utc.clone(),
            "temp_C" => self.temp_c.map(|v| v.to_string()),
            "humidity_%" => self.humidity_pct.map(|v| v.to_string()),
            "pressure_hPa" => self.pressure_hpa.map(|v| v.to_string()),
            "wind_raw" => self.wind_raw.map(|v| v.to_string()),
            "wind_volts" => self.wind_volts.map(|v| v.to_string()),
            "speed_kph" => self.speed_kph.map(|v| v.to_string()),
            "fix" => self.fix.map(|v| v.to_string()),
            "lat" => self.lat.map(|v| v.to_string()),
            "lon" => self.lon.map(|v| v.to_string()),
            "heading_deg" => self.heading_deg.map(|v| v.to_string()),
            "lightning" => self.lightning.map(|v| v.to_string()),
            "distance_km" => self.distance_km.map(|v| v.to_string()),
            _ => None,
        }
    }
}

/// One-line operator summary; absent values print as `-`
impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt<T: fmt::Display>(value: &Option<T>) -> String {
            value.as_ref().map_or_else(|| "-".to_string(), |v| v.to_string())
        }

        let event = match (self.lightning, self.noise, self.disturber) {
            (Some(true), _, _) => format!("lightning {} km", opt(&self.distance_km)),
            (_, Some(true), _) => "noise".to_string(),
            (_, _, Some(true)) => "disturber".to_string(),
            _ => "-".to_string(),
        };

        write!(
            f,
            "{} | {} C {} % {} hPa | {} kph | fix {} {},{} | hdg {} | {}",
            opt(&self.time_utc),
            opt(&self.temp_c),
            opt(&self.humidity_pct),
            opt(&self.pressure_hpa),
            opt(&self.speed_kph),
            opt(&self.fix),
            opt(&self.lat),
            opt(&self.lon),
            opt(&self.heading_deg),
            event,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_replaces_present_fields() {
        let mut base = Snapshot {
            temp_c: Some(20.0),
            speed_kph: Some(12.3),
            ..Snapshot::default()
        };
        base.overlay(Snapshot {
            speed_kph: Some(41.48),
            fix: Some(true),
            ..Snapshot::default()
        });

        assert_eq!(base.temp_c, Some(20.0));
        assert_eq!(base.speed_kph, Some(41.48));
        assert_eq!(base.fix, Some(true));
    }

    #[test]
    fn test_overlay_keeps_fields_absent_in_other() {
        let mut base = Snapshot {
            heading_deg: Some(84.4),
            ..Snapshot::default()
        };
        base.overlay(Snapshot::default());
        assert_eq!(base.heading_deg, Some(84.4));
    }

    #[test]
    fn test_clear_by_key() {
        let mut snapshot = Snapshot {
            speed_kph: Some(12.0),
            humidity_pct: Some(40.0),
            event_timestamp: Some(Utc::now()),
            ..Snapshot::default()
        };
        assert!(snapshot.clear("speed_kph"));
        assert!(snapshot.clear("humidity_%"));
        assert!(snapshot.clear("timestamp"));
        assert!(!snapshot.clear("altitude_m"));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_is_empty() {
        assert!(Snapshot::new().is_empty());
        let snapshot = Snapshot {
            noise: Some(true),
            ..Snapshot::default()
        };
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_columns() {
        let snapshot = Snapshot {
            time_utc: Some("123519".to_string()),
            temp_c: Some(21.5),
            fix: Some(false),
            distance_km: Some(14),
            ..Snapshot::default()
        };

        assert_eq!(snapshot.column("time_utc").as_deref(), Some("123519"));
        assert_eq!(snapshot.column("temp_C").as_deref(), Some("21.5"));
        assert_eq!(snapshot.column("fix").as_deref(), Some("false"));
        assert_eq!(snapshot.column("distance_km").as_deref(), Some("14"));
        assert_eq!(snapshot.column("altitude_m"), None);
        assert_eq!(snapshot.column("lat"), None);
        assert_eq!(COLUMNS.len(), 14);
    }

    #[test]
    fn test_display_summary() {
        let snapshot = Snapshot {
            time_utc: Some("123519".to_string()),
            temp_c: Some(21.5),
            fix: Some(false),
            lightning: Some(true),
            distance_km: Some(14),
            ..Snapshot::default()
        };
        assert_eq!(
            snapshot.to_string(),
            "123519 | 21.5 C - % - hPa | - kph | fix false -,- | hdg - | lightning 14 km"
        );

        let noise = Snapshot {
            noise: Some(true),
            ..Snapshot::default()
        };
        assert!(noise.to_string().ends_with("| noise"));
    }

    #[test]
    fn test_serialize_uses_column_names_and_skips_absent() {
        let snapshot = Snapshot {
            temp_c: Some(21.5),
            humidity_pct: Some(40.0),
            lightning: Some(true),
            ..Snapshot::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"temp_C":21.5,"humidity_%":40.0,"lightning":true}"#);
    }
}
