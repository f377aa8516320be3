use std::time::Duration;
use thiserror::Error;

/// Errors from upstream data and exchange APIs.
///
/// The classification into transient and permanent failures drives the
/// retry discipline: transient errors (timeouts, throttling, server-side
/// faults) are retried with backoff, everything else surfaces immediately.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {code}: {body}")]
    Status {
        code: u16,
        body: String,
        /// Server-provided hint (Retry-After) for when to try again.
        retry_after: Option<Duration>,
    },

    #[error("Failed to deserialize upstream response: {0}")]
    Deserialization(String),

    #[error("Upstream returned structurally invalid data: {0}")]
    InvalidData(String),

    #[error("Cache I/O failure: {0}")]
    CacheIo(#[from] std::io::Error),

    #[error("Gave up after {attempts} attempts; last error: {last}")]
    Exhausted { attempts: u32, last: Box<ApiError> },
}

impl ApiError {
    /// Whether a retry has any chance of succeeding.
    ///
    /// Timeouts, connection failures, HTTP 429 and 5xx are transient.
    /// Other 4xx codes and malformed responses are permanent: the request
    /// itself is wrong and repeating it would only burn the rate budget.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(e) => e.is_timeout() || e.is_connect(),
            ApiError::Status { code, .. } => *code == 429 || *code >= 500,
            ApiError::Deserialization(_)
            | ApiError::InvalidData(_)
            | ApiError::CacheIo(_)
            | ApiError::Exhausted { .. } => false,
        }
    }

    /// The server's own suggestion for when to retry, if it gave one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
