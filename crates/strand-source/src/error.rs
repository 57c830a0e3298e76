use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether the request never reached the remote (connection refused,
    /// blocked, DNS failure). Timeouts are not counted.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

pub type SourceResult<T> = Result<T, SourceError>;
