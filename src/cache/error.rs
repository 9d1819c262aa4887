//! Cache error types.

use thiserror::Error;

/// Errors raised by a single backing store. They never escape `ResilientCache`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to connect to the distributed store
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    /// Failed to serialize or deserialize a cached value
    #[error("Cache serialization error: {0}")]
    SerializationError(String),

    /// Cache operation timed out
    #[error("Cache operation timed out: {0}")]
    Timeout(String),

    /// Generic backend error
    #[error("Cache backend error: {0}")]
    BackendError(String),

    /// The store was closed
    #[error("Cache store is closed")]
    Closed,
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
