//! Error types for timing analysis

use thiserror::Error;

/// Errors that abort a reconciliation run
#[derive(Debug, Error)]
pub enum TimingError {
    /// A timestamp field was present but could not be parsed as RFC 3339
    #[error("malformed timestamp in {field}: {value:?}")]
    MalformedTimestamp {
        field: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A pull duration was not a number followed by `ms` or `s`
    #[error("invalid pull duration: {0:?}")]
    InvalidDuration(String),

    /// The pod status document was not valid YAML/JSON
    #[error("failed to parse pod status document")]
    Document(#[from] serde_yaml::Error),

    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TimingError>;
