//! Unified error types for cdfcache.
//!
//! The cache facade absorbs all of these at its boolean boundary; the
//! `try_*` operations hand them to callers that want the cause.

use crate::config::ConfigError;
use crate::storage::StorageError;

/// Unified error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Object identifiers must contain at least one byte.
    #[error("INVALID_ID: object identifier must not be empty")]
    EmptyId,

    /// The encryption key must contain at least one byte.
    #[error("INVALID_KEY: encryption key must not be empty")]
    EmptyKey,

    /// The object can never fit, whatever gets evicted.
    #[error("TOO_LARGE: object of {size} bytes exceeds cache budget of {max_size} bytes")]
    TooLarge { size: u64, max_size: u64 },

    /// Stored data failed verification.
    #[error("INTEGRITY_ERROR: {0}")]
    Integrity(#[from] IntegrityError),

    /// Filesystem operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Storage(#[from] StorageError),

    /// Configuration could not be loaded or validated.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),
}

/// Reasons a stored object or metadata file fails verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    /// The buffer cannot even hold its fixed-size header.
    #[error("buffer of {len} bytes is shorter than the {needed}-byte header")]
    Truncated { len: usize, needed: usize },

    /// The identifier embedded in the object is not the one requested.
    #[error("embedded identifier does not match the requested one")]
    IdMismatch,

    /// The recomputed digest differs from the stored one.
    #[error("digest mismatch")]
    HashMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TooLarge { size: 300, max_size: 250 };
        assert!(err.to_string().contains("TOO_LARGE"));
        assert!(err.to_string().contains("300"));
        assert!(err.to_string().contains("250"));
    }

    #[test]
    fn test_integrity_error_conversion() {
        let err: Error = IntegrityError::HashMismatch.into();
        assert!(matches!(err, Error::Integrity(IntegrityError::HashMismatch)));
        assert!(err.to_string().starts_with("INTEGRITY_ERROR"));
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: Error = StorageError::InvalidPath("empty file name".into()).into();
        assert!(matches!(err, Error::Storage(StorageError::InvalidPath(_))));
    }
}
