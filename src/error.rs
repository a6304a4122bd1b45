//! Crate-wide error kinds for the collection engine.
//!
//! Sub-unit failures (a group that fails to resolve, a post that 404s)
//! are recorded on task metrics and never surface as `EngineError` — only
//! aggregate failures (auth, store outage, timeout, cancel, retries
//! exhausted) travel as errors up through the worker and into the HTTP
//! layer.

use thiserror::Error;

/// Closed set of error kinds the engine can produce, per the propagation
/// policy in spec.md §7.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("upstream transient error: {0}")]
    UpstreamTransient(String),

    #[error("upstream permanent error: {0}")]
    UpstreamPermanent(String),

    #[error("upstream auth error: {0}")]
    UpstreamAuth(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("task cancelled")]
    Cancelled,

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Short machine-readable kind, used in HTTP error payloads and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "Validation",
            EngineError::NotFound(_) => "NotFound",
            EngineError::Conflict(_) => "Conflict",
            EngineError::RateLimited { .. } => "RateLimited",
            EngineError::UpstreamTransient(_) => "UpstreamTransient",
            EngineError::UpstreamPermanent(_) => "UpstreamPermanent",
            EngineError::UpstreamAuth(_) => "UpstreamAuth",
            EngineError::StoreUnavailable(_) => "StoreUnavailable",
            EngineError::QueueUnavailable(_) => "QueueUnavailable",
            EngineError::Cancelled => "Cancelled",
            EngineError::Timeout(_) => "Timeout",
            EngineError::Internal(_) => "Internal",
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => EngineError::NotFound("row not found".to_string()),
            other => EngineError::StoreUnavailable(other.to_string()),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
