//! Error types for Tracekey operations

use thiserror::Error;

/// Wire codec errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The byte stream is empty or not a whole number of 20-byte frames.
    #[error("Unexpected end of data: {len} bytes is not a positive multiple of 20")]
    UnexpectedEof { len: usize },

    #[error("I/O error: {reason}")]
    Io { reason: String },
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        CodecError::Io {
            reason: err.to_string(),
        }
    }
}

/// Upload validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Diagnosis keys is nil")]
    NilDiagnosisKeys,

    #[error("Maximum upload batch size exceeded: {got} keys, limit is {max}")]
    MaxUploadExceeded { max: usize, got: usize },
}

/// Durable repository errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// The repository holds no diagnosis keys yet.
    #[error("No diagnosis keys stored")]
    NoDiagnosisKeys,

    #[error("Store failed: {reason}")]
    StoreFailed { reason: String },

    #[error("Fetch failed: {reason}")]
    FetchFailed { reason: String },

    #[error("Repository lock poisoned")]
    LockPoisoned,
}

/// Cache maintenance errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache lock poisoned")]
    LockPoisoned,

    #[error("Cache backend error: {reason}")]
    Backend { reason: String },

    #[error("Cache seek failed: {reason}")]
    Seek { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Tracekey errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TracekeyError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl TracekeyError {
    /// True for the repository's "no keys yet" sentinel, which hydration
    /// treats as an empty result.
    pub fn is_no_diagnosis_keys(&self) -> bool {
        matches!(
            self,
            TracekeyError::Repository(RepositoryError::NoDiagnosisKeys)
        )
    }
}

/// Result type alias for Tracekey operations.
pub type TracekeyResult<T> = Result<T, TracekeyError>;

// =============================================================================
// TESTS
// =============================================================================
