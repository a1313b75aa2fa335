//! Error types for the cache and prefetch layers.
//!
//! Only argument errors ever reach callers of [`KeyedCache`](crate::KeyedCache).
//! Storage errors are produced by [`DurableStore`](crate::DurableStore)
//! implementations and absorbed by the persistence layer, and fetch errors
//! are absorbed by the prefetch advisor.

use std::io;

/// The main error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The provided key is invalid (empty, too long).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The requested TTL is zero.
    #[error("invalid ttl: must be greater than zero")]
    InvalidTtl,

    /// The value could not be serialized.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The durable store is missing, disabled, or failing on every call.
    #[error("durable storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A durable store write did not fit in the store's quota.
    #[error("storage quota exceeded: {needed} bytes (limit: {limit})")]
    QuotaExceeded { needed: usize, limit: usize },

    /// A snapshot could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred in a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A Tokio runtime was required but none is running.
    #[error("no tokio runtime available: {0}")]
    RuntimeUnavailable(String),
}

impl CacheError {
    /// Whether this error is a programmer error that must reach the caller.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            CacheError::InvalidKey(_) | CacheError::InvalidTtl | CacheError::InvalidValue(_)
        )
    }
}

/// A specialized Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Failure of a speculative fetch issued by the prefetch advisor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The transport failed before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// The origin answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The response body could not be decoded into the cached type.
    #[error("decode error: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::InvalidKey("key must not be empty".to_string());
        assert_eq!(format!("{}", err), "invalid key: key must not be empty");

        let err = CacheError::QuotaExceeded {
            needed: 6_000_000,
            limit: 5_242_880,
        };
        assert_eq!(
            format!("{}", err),
            "storage quota exceeded: 6000000 bytes (limit: 5242880)"
        );

        assert_eq!(
            format!("{}", FetchError::Status(503)),
            "unexpected status 503"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "read-only");
        let cache_err: CacheError = io_err.into();
        assert!(matches!(cache_err, CacheError::Io(_)));
        assert!(!cache_err.is_argument_error());
    }

    #[test]
    fn test_argument_errors() {
        assert!(CacheError::InvalidTtl.is_argument_error());
        assert!(CacheError::InvalidKey(String::new()).is_argument_error());
        assert!(!CacheError::StorageUnavailable("gone".into()).is_argument_error());
    }
}
