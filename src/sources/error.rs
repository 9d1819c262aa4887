//! Provider error types.

use std::time::Duration;
use thiserror::Error;

/// Why a single source failed. Never escapes `SourceResolver`.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("no result")]
    Empty,

    #[error("{0} is not supported by this source")]
    Unsupported(&'static str),
}

impl ProviderError {
    /// Metrics label for the failure kind.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Unsupported(_) => "unsupported",
            ProviderError::Empty => "empty",
            _ => "failure",
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
