//! Tracekey Core - Diagnosis Key types and wire codec
//!
//! Pure data structures and codec functions with no I/O of their own. All
//! other crates depend on this.

pub mod codec;
pub mod day;
pub mod error;
pub mod record;

pub use codec::{decode, encode, encode_into, parse_diagnosis_keys, write_diagnosis_keys};
pub use day::DayBoundary;
pub use error::{
    CacheError, CodecError, ConfigError, RepositoryError, TracekeyError, TracekeyResult,
    ValidationError,
};
pub use record::{
    DiagnosisKey, DIAGNOSIS_KEY_SIZE, INTERVAL_NUMBER_SIZE, TEMPORARY_EXPOSURE_KEY_SIZE,
};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
