//! Calendar-day truncation for the cache's day index.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Maps upload timestamps onto the calendar day used to window exports.
///
/// Defaults to the UTC calendar day. A fixed offset (seconds east of UTC)
/// shifts the day boundary for consumers that count days in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DayBoundary {
    offset_seconds: i32,
}

impl DayBoundary {
    /// UTC midnight boundary.
    pub const fn utc() -> Self {
        Self { offset_seconds: 0 }
    }

    /// Boundary at local midnight for a fixed offset east of UTC.
    ///
    /// Offsets must lie strictly within one day either side of UTC.
    pub fn with_offset_seconds(offset_seconds: i32) -> Result<Self, ConfigError> {
        match FixedOffset::east_opt(offset_seconds) {
            Some(_) => Ok(Self { offset_seconds }),
            None => Err(ConfigError::InvalidValue {
                field: "day_boundary_offset_secs".to_string(),
                value: offset_seconds.to_string(),
                reason: "offset must be within (-86400, 86400)".to_string(),
            }),
        }
    }

    /// Offset east of UTC, in seconds.
    pub fn offset_seconds(&self) -> i32 {
        self.offset_seconds
    }

    /// Truncate a timestamp to its calendar day.
    pub fn truncate(&self, ts: DateTime<Utc>) -> NaiveDate {
        // Constructor guarantees the offset is in range.
        match FixedOffset::east_opt(self.offset_seconds) {
            Some(offset) => ts.with_timezone(&offset).date_naive(),
            None => ts.date_naive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_utc_truncation() {
        let boundary = DayBoundary::utc();
        let ts = Utc.with_ymd_and_hms(2020, 6, 1, 23, 59, 59).unwrap();
        assert_eq!(
            boundary.truncate(ts),
            NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_default_is_utc() {
        assert_eq!(DayBoundary::default(), DayBoundary::utc());
    }

    #[test]
    fn test_offset_moves_boundary() {
        // 23:30 UTC is already the next day at UTC+2.
        let boundary = DayBoundary::with_offset_seconds(2 * 3600).unwrap();
        let ts = Utc.with_ymd_and_hms(2020, 6, 1, 23, 30, 0).unwrap();
        assert_eq!(
            boundary.truncate(ts),
            NaiveDate::from_ymd_opt(2020, 6, 2).unwrap()
        );

        let west = DayBoundary::with_offset_seconds(-5 * 3600).unwrap();
        let early = Utc.with_ymd_and_hms(2020, 6, 2, 3, 0, 0).unwrap();
        assert_eq!(
            west.truncate(early),
            NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_offset_out_of_range_rejected() {
        assert!(DayBoundary::with_offset_seconds(86_400).is_err());
        assert!(DayBoundary::with_offset_seconds(-86_400).is_err());
        assert!(DayBoundary::with_offset_seconds(86_399).is_ok());
    }
}
