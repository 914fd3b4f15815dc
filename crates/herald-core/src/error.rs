//! Error types shared by every Herald crate.

use thiserror::Error;

/// Herald error taxonomy.
///
/// A failed delivery attempt is not an error: it is recorded as a `FAILED`
/// transmission record and handled by the retry policy.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Malformed or incomplete input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate slug, or an operation already in flight for the same record.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Config error: {0}")]
    Config(String),

    /// Wrapped failure of a background operation.
    #[error("Service error: {0}")]
    Service(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HeraldError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, HeraldError>;
