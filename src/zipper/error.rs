//! Engine error types.

use std::fmt;
use thiserror::Error;

/// The three logical operations the engine serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Find,
    Render,
    Info,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::Render => "render",
            Operation::Info => "info",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one backend attempt that did not produce a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Connect or read timed out, or the call deadline abandoned the attempt.
    #[error("timed out")]
    Timeout,

    /// Connection refused or otherwise not established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The backend answered 404: it holds no data for the query.
    #[error("not found")]
    NotFound,

    /// The backend answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The reply body did not decode.
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// Any other transport failure while sending or reading.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend task ended without reporting (panicked or was cancelled).
    #[error("request aborted")]
    Aborted,
}

impl BackendError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_connect() {
            BackendError::Connect(e.to_string())
        } else if e.is_decode() {
            BackendError::Malformed(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// Errors surfaced to the caller of a logical operation.
#[derive(Debug, Error)]
pub enum ZipperError {
    /// No targeted backend produced a usable reply.
    #[error("all backends failed for {0}")]
    AllBackendsFailed(Operation),

    /// A configured backend address could not be turned into a URL.
    #[error("invalid backend address '{address}': {reason}")]
    InvalidBackend { address: String, reason: String },

    /// The shared HTTP transport could not be built.
    #[error("failed to build backend transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// Only one half of the search routing pair was configured.
    #[error("carbonsearch requires both prefix and backend")]
    IncompleteSearch,
}

/// Result type for engine operations.
pub type ZipperResult<T> = Result<T, ZipperError>;
