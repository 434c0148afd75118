//! Position report sent to the tracking server

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gps::Fix;

/// Bearing reported when the fix carries no course
pub const DEFAULT_BEARING: f64 = 0.0;

/// Battery level reported by a vehicle-powered unit
pub const DEFAULT_BATTERY: f64 = 100.0;

/// Query parameters of one position report
///
/// `timestamp` is the send time, not the GPS time of the fix: the server
/// records arrival, the fix keeps GPS time for local logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionReport {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub timestamp: i64,
    pub altitude: f64,
    pub speed: f64,
    pub bearing: f64,
    pub batt: f64,
}

impl PositionReport {
    /// Build the report for one fix
    ///
    /// # Arguments
    ///
    /// * `fix` - Position to report
    /// * `device_id` - Identifier the server knows the vehicle by
    /// * `sent_at` - Send time; becomes `timestamp` instead of the fix's own time
    ///
    /// # Returns
    ///
    /// Report with speed rounded to 2 decimals and bearing/battery defaulted
    /// when the fix has none
    pub fn new(fix: &Fix, device_id: &str, sent_at: DateTime<Utc>) -> Self {
        Self {
            id: device_id.to_string(),
            lat: fix.latitude,
            lon: fix.longitude,
            timestamp: sent_at.timestamp(),
            altitude: fix.altitude_m,
            speed: round2(fix.speed_kmh),
            bearing: fix.course_deg.unwrap_or(DEFAULT_BEARING),
            batt: DEFAULT_BATTERY,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::parse_fix;
    use chrono::TimeZone;

    fn sample_fix() -> Fix {
        parse_fix("1234.5678,S,07612.3456,E,010124,120000.00,100.0,10.0").unwrap()
    }

    #[test]
    fn test_report_uses_send_time() {
        let sent_at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        let report = PositionReport::new(&sample_fix(), "baleno", sent_at);

        assert_eq!(report.timestamp, sent_at.timestamp());
        assert_ne!(report.timestamp, sample_fix().timestamp.timestamp());
    }

    #[test]
    fn test_report_fields() {
        let report = PositionReport::new(&sample_fix(), "baleno", Utc::now());

        assert_eq!(report.id, "baleno");
        assert!(report.lat < 0.0);
        assert!(report.lon > 0.0);
        assert_eq!(report.altitude, 100.0);
        assert_eq!(report.speed, 18.52);
        assert_eq!(report.bearing, DEFAULT_BEARING);
        assert_eq!(report.batt, DEFAULT_BATTERY);
    }

    #[test]
    fn test_course_becomes_bearing() {
        let fix = parse_fix("1234.5678,N,07612.3456,E,010124,120000.00,100.0,10.0,91.25").unwrap();
        let report = PositionReport::new(&fix, "baleno", Utc::now());
        assert_eq!(report.bearing, 91.25);
    }

    #[test]
    fn test_speed_rounding() {
        assert_eq!(round2(18.5249), 18.52);
        assert_eq!(round2(18.525_1), 18.53);
        assert_eq!(round2(0.0), 0.0);
    }
}
