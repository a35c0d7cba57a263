//! Error types for juntdb
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! | Category | Variants |
//! |----------|----------|
//! | Write validation | `UnsupportedType`, `MalformedIdentity` |
//! | Commit | `CommitFailed`, `IdentityExhausted` |
//! | Lookup | `NotFound`, `UnknownColumn` |
//! | Input / codec | `InvalidInput`, `Decode` |
//! | System | `Storage`, `Io`, `Config` |

use std::io;
use thiserror::Error;

/// Result type alias for juntdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for juntdb
#[derive(Debug, Error)]
pub enum Error {
    /// A field's value kind has no storage type in the registry
    #[error("unsupported type '{kind}' for field '{field}'")]
    UnsupportedType {
        /// Field that would have introduced the column
        field: String,
        /// Semantic kind name of the offending value
        kind: String,
    },

    /// Identity field missing, or not exactly 17 decimal digits
    #[error("malformed identity: {reason}")]
    MalformedIdentity {
        /// What was wrong with the identity
        reason: String,
    },

    /// Bounded commit retries were exhausted
    #[error("commit failed after {attempts} attempts: {reason}")]
    CommitFailed {
        /// Number of commit attempts made
        attempts: usize,
        /// Last engine error seen
        reason: String,
    },

    /// Collision-regeneration loop went over its bound
    #[error("identity exhausted after {attempts} attempts (last tried {last})")]
    IdentityExhausted {
        /// Number of insert attempts made
        attempts: usize,
        /// Last identity that collided
        last: String,
    },

    /// Point lookup on a missing identity
    #[error("identity not found: {identity}")]
    NotFound {
        /// Identity that was looked up
        identity: String,
    },

    /// Projection or filter names a column the table does not have
    #[error("unknown column: {column}")]
    UnknownColumn {
        /// Column name as supplied
        column: String,
    },

    /// Invalid argument supplied by the caller
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Description of the problem
        reason: String,
    },

    /// A stored value could not be decoded into its declared kind
    #[error("decode error in column '{column}': {reason}")]
    Decode {
        /// Column the value was read from
        column: String,
        /// Description of the problem
        reason: String,
    },

    /// Non-transient relational engine error
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error (config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be parsed or is invalid
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a `Storage` error from anything displayable
    pub fn storage(msg: impl std::fmt::Display) -> Self {
        Error::Storage(msg.to_string())
    }

    /// Create an `InvalidInput` error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a `MalformedIdentity` error
    pub fn malformed_identity(reason: impl Into<String>) -> Self {
        Error::MalformedIdentity {
            reason: reason.into(),
        }
    }

    /// Create a `Decode` error for a column
    pub fn decode(column: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Decode {
            column: column.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a `Config` error
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True for errors a caller may reasonably retry as-is
    ///
    /// A `CommitFailed` means lock contention outlasted the retry budget, so
    /// the same write can succeed later. Everything else fails the same way
    /// on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::CommitFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unsupported_type() {
        let err = Error::UnsupportedType {
            field: "payload".to_string(),
            kind: "bytes".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("unsupported type"));
        assert!(msg.contains("payload"));
        assert!(msg.contains("bytes"));
    }

    #[test]
    fn test_error_display_commit_failed() {
        let err = Error::CommitFailed {
            attempts: 4,
            reason: "database is locked".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("database is locked"));
    }

    #[test]
    fn test_error_display_identity_exhausted() {
        let err = Error::IdentityExhausted {
            attempts: 64,
            last: "20240101120000063".to_string(),
        };
        assert!(err.to_string().contains("20240101120000063"));
    }

    #[test]
    fn test_error_display_decode() {
        let err = Error::decode("viewed", "expected integer, got text");
        let msg = err.to_string();
        assert!(msg.contains("viewed"));
        assert!(msg.contains("expected integer"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_predicates() {
        let not_found = Error::NotFound {
            identity: "20240101120000000".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_retryable());

        let commit = Error::CommitFailed {
            attempts: 4,
            reason: "busy".to_string(),
        };
        assert!(commit.is_retryable());
        assert!(!Error::storage("disk full").is_retryable());
    }
}
