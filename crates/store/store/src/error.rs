use std::time::Duration;

use thiserror::Error;

/// Errors from cache store and cache service operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// Returns `true` if a key was absent or held an empty value.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for failures caused by the connection to the store
    /// rather than by the data: network, pool, deadline or cancellation.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::Cancelled
        )
    }
}
