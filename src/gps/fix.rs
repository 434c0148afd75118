//! # Position Fix Parser
//!
//! Parses the payload of a `+CGPSINFO:` answer into a [`Fix`].
//!
//! ## Sentence Layout
//!
//! ```text
//! 1234.5678,N,07612.3456,E,010124,120000.00,100.0,10.0[,course]
//! ddmm.mmmm,N/S,dddmm.mmmm,E/W,ddmmyy,hhmmss[.ss],alt(m),speed(knots)
//! ```
//!
//! Parsing is pure: the same sentence always yields the same result, and any
//! defect yields a single `Malformed` error, never a partial fix.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt;

use crate::error::{Result, TrackerError};

/// Knots to km/h conversion factor
pub const KNOTS_TO_KMH: f64 = 1.852;

/// Number of mandatory fields in a position sentence
pub const SENTENCE_FIELDS: usize = 8;

/// A single resolved GPS position sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fix {
    /// Decimal degrees, south negative
    pub latitude: f64,
    /// Decimal degrees, west negative
    pub longitude: f64,
    pub altitude_m: f64,
    pub speed_kmh: f64,
    /// Course over ground in degrees, when the modem reports it
    pub course_deg: Option<f64>,
    /// GPS time of the fix (whole seconds)
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    /// Timestamp as `YYYY-MM-DDTHH:MM:SSZ`
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- GPS Data ---")?;
        writeln!(f, "Timestamp: {}", self.timestamp_iso())?;
        writeln!(f, "Latitude: {:.6}°", self.latitude)?;
        writeln!(f, "Longitude: {:.6}°", self.longitude)?;
        writeln!(f, "Altitude: {} meters", self.altitude_m)?;
        write!(f, "Speed: {:.2} km/h", self.speed_kmh)
    }
}

fn malformed(reason: impl Into<String>) -> TrackerError {
    TrackerError::Malformed(reason.into())
}

/// Parse a comma-delimited position sentence
///
/// # Arguments
///
/// * `sentence` - Payload of a `+CGPSINFO: ` answer: lat, N/S, lon, E/W,
///   ddmmyy, hhmmss[.ss], altitude, speed in knots and an optional course
///
/// # Returns
///
/// A `Fix` with signed decimal degrees, speed in km/h and the UTC time of the fix
///
/// # Errors
///
/// Returns `TrackerError::Malformed` if:
/// - Fewer than 8 fields are present
/// - A coordinate, hemisphere, date, time or number cannot be read
/// - A coordinate falls outside its valid range
///
/// # Examples
///
/// ```
/// use vehicle_tracker::gps::fix::parse_fix;
///
/// let fix = parse_fix("1234.5678,N,07612.3456,E,010124,120000.00,100.0,10.0").unwrap();
/// assert!((fix.latitude - 12.576130).abs() < 1e-6);
/// assert_eq!(fix.timestamp_iso(), "2024-01-01T12:00:00Z");
/// ```
pub fn parse_fix(sentence: &str) -> Result<Fix> {
    let fields: Vec<&str> = sentence.trim().split(',').map(str::trim).collect();
    if fields.len() < SENTENCE_FIELDS {
        return Err(malformed(format!(
            "expected {} fields, got {}",
            SENTENCE_FIELDS,
            fields.len()
        )));
    }

    let latitude = parse_coordinate(fields[0], 2, fields[1], ('N', 'S'), 90.0)?;
    let longitude = parse_coordinate(fields[2], 3, fields[3], ('E', 'W'), 180.0)?;
    let timestamp = parse_timestamp(fields[4], fields[5])?;
    let altitude_m = parse_number(fields[6], "altitude")?;
    let speed_knots = parse_number(fields[7], "speed")?;

    let course_deg = match fields.get(8) {
        Some(raw) if !raw.is_empty() => Some(parse_number(raw, "course")?),
        _ => None,
    };

    Ok(Fix {
        latitude,
        longitude,
        altitude_m,
        speed_kmh: speed_knots * KNOTS_TO_KMH,
        course_deg,
        timestamp,
    })
}

fn parse_number(raw: &str, name: &str) -> Result<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| malformed(format!("invalid {}: {:?}", name, raw)))
}

/// Convert `d..dmm.mmmm` plus hemisphere to signed decimal degrees
fn parse_coordinate(
    raw: &str,
    degree_digits: usize,
    hemisphere: &str,
    (positive, negative): (char, char),
    limit: f64,
) -> Result<f64> {
    let (deg_part, min_part) = match (raw.get(..degree_digits), raw.get(degree_digits..)) {
        (Some(d), Some(m)) if !m.is_empty() => (d, m),
        _ => return Err(malformed(format!("invalid coordinate: {:?}", raw))),
    };

    if !deg_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("invalid coordinate degrees: {:?}", raw)));
    }
    let degrees = parse_number(deg_part, "coordinate degrees")?;
    let minutes = parse_number(min_part, "coordinate minutes")?;
    if !(0.0..60.0).contains(&minutes) {
        return Err(malformed(format!("coordinate minutes out of range: {:?}", raw)));
    }

    let magnitude = degrees + minutes / 60.0;
    if magnitude > limit {
        return Err(malformed(format!("coordinate out of range: {:?}", raw)));
    }

    let mut chars = hemisphere.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c == positive => Ok(magnitude),
        (Some(c), None) if c == negative => Ok(-magnitude),
        _ => Err(malformed(format!("invalid hemisphere: {:?}", hemisphere))),
    }
}

/// Assemble a UTC instant from `ddmmyy` and `hhmmss[.ss]`
fn parse_timestamp(date: &str, time: &str) -> Result<DateTime<Utc>> {
    let digits = |s: &str| s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit());

    let clock = time.get(..6).unwrap_or_default();
    let fraction = time.get(6..).unwrap_or_default();
    let fraction_ok = fraction.is_empty()
        || (fraction.starts_with('.') && fraction[1..].bytes().all(|b| b.is_ascii_digit()));

    if !digits(date) || !digits(clock) || !fraction_ok {
        return Err(malformed(format!("invalid date/time: {:?} {:?}", date, time)));
    }

    let num = |s: &str, range: std::ops::Range<usize>| -> u32 {
        // Ranges are within the six validated digits
        s[range].parse().unwrap_or_default()
    };

    let day = NaiveDate::from_ymd_opt(2000 + num(date, 4..6) as i32, num(date, 2..4), num(date, 0..2));
    let clock = NaiveTime::from_hms_opt(num(clock, 0..2), num(clock, 2..4), num(clock, 4..6));

    match (day, clock) {
        (Some(d), Some(t)) => Ok(Utc.from_utc_datetime(&d.and_time(t))),
        _ => Err(malformed(format!("date/time out of range: {:?} {:?}", date, time))),
    }
}

/// Extract the sentence from a raw `+CGPSINFO:` answer
///
/// Returns `None` when the answer carries no payload line.
pub fn extract_payload<'a>(answer: &'a str, prefix: &str) -> Option<&'a str> {
    let start = answer.find(prefix)? + prefix.len();
    let payload = answer[start..].lines().next()?.trim();
    Some(payload)
}

/// True when every field is empty, i.e. the receiver has no lock yet
pub fn is_empty_sentence(sentence: &str) -> bool {
    sentence.split(',').all(|f| f.trim().is_empty())
}
