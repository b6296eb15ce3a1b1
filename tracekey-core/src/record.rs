//! The Diagnosis Key record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::DayBoundary;

/// Size of a `TemporaryExposureKey` in bytes.
pub const TEMPORARY_EXPOSURE_KEY_SIZE: usize = 16;

/// Size of an `ENIntervalNumber` in bytes.
pub const INTERVAL_NUMBER_SIZE: usize = 4;

/// Size of one encoded Diagnosis Key frame.
pub const DIAGNOSIS_KEY_SIZE: usize = TEMPORARY_EXPOSURE_KEY_SIZE + INTERVAL_NUMBER_SIZE;

/// A `TemporaryExposureKey` paired with the `ENIntervalNumber` it was
/// generated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiagnosisKey {
    /// The opaque key payload.
    pub temporary_exposure_key: [u8; TEMPORARY_EXPOSURE_KEY_SIZE],

    /// 10 minute window since the Unix epoch in which the key was generated.
    pub interval_number: u32,

    /// When the key reached the server. Used for windowing exports only and
    /// never part of the wire form.
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl DiagnosisKey {
    /// Create a key that has not been persisted yet.
    pub fn new(
        temporary_exposure_key: [u8; TEMPORARY_EXPOSURE_KEY_SIZE],
        interval_number: u32,
    ) -> Self {
        Self {
            temporary_exposure_key,
            interval_number,
            uploaded_at: None,
        }
    }

    /// Stamp the upload time.
    pub fn with_uploaded_at(mut self, uploaded_at: DateTime<Utc>) -> Self {
        self.uploaded_at = Some(uploaded_at);
        self
    }

    /// The calendar day the key was uploaded on, if it has been persisted.
    pub fn uploaded_on(&self, boundary: &DayBoundary) -> Option<NaiveDate> {
        self.uploaded_at.map(|ts| boundary.truncate(ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_frame_size() {
        assert_eq!(DIAGNOSIS_KEY_SIZE, 20);
    }

    #[test]
    fn test_new_key_is_not_uploaded() {
        let key = DiagnosisKey::new([7u8; 16], 2_650_000);
        assert!(key.uploaded_at.is_none());
        assert!(key.uploaded_on(&DayBoundary::utc()).is_none());
    }

    #[test]
    fn test_uploaded_on() {
        let ts = Utc.with_ymd_and_hms(2020, 5, 4, 13, 0, 0).unwrap();
        let key = DiagnosisKey::new([1u8; 16], 1).with_uploaded_at(ts);
        assert_eq!(
            key.uploaded_on(&DayBoundary::utc()),
            Some(NaiveDate::from_ymd_opt(2020, 5, 4).unwrap())
        );
    }
}
