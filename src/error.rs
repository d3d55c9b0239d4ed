//! Error types for the completeness engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the completeness engine.
///
/// Domain-expected absence (a missing link, annotation or attribute) is never
/// an error: it is folded into a classification. Only collaborator failures,
/// malformed input and configuration problems surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// Event store collaborator errors, including unreadable store dumps
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid timestamp or time range
    #[error("Temporal error: {0}")]
    Temporal(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A classification worker failed to complete
    #[error("Task error: {0}")]
    Task(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Configuration(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}
