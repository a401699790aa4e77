//! Backend and codec error types.
//!
//! Every [`LedgerBackend`](crate::LedgerBackend) classifies its failures into
//! [`BackendError`] before they leave the backend. The classification is the
//! only input to the connector's retry decision: a [`BackendError::Conflict`]
//! may be retried, everything else is final.
//!
//! # Error Types
//!
//! - [`BackendError::Conflict`] - Read/write-set conflict detected at commit time
//! - [`BackendError::Fatal`] - Any other backend failure
//! - [`BackendError::Unsupported`] - The backend has no such function
//! - [`CodecError`] - Compression or binary layout failure
//!
//! # Example
//!
//! ```
//! use ledger_kv_storage::{BackendError, BackendResult};
//!
//! fn submit() -> BackendResult<Vec<u8>> {
//!     Err(BackendError::conflict("invalid transaction: status 11"))
//! }
//!
//! assert!(submit().unwrap_err().is_conflict());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors returned by a ledger backend invocation or query.
///
/// # Non-exhaustive
///
/// New variants may be added in minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// The transaction was rejected because a concurrent transaction touched
    /// the same state between endorsement and commit.
    ///
    /// Re-submitting the same invocation is expected to succeed eventually.
    #[error("Write conflict: {message}")]
    Conflict {
        /// Description reported by the ledger.
        message: String,
    },

    /// A permanent backend failure.
    #[error("Backend failure: {message}")]
    Fatal {
        /// Description of the failure.
        message: String,
        /// The underlying error, when one is available.
        #[source]
        source: Option<BoxError>,
    },

    /// The backend does not implement the requested function.
    #[error("Unsupported ledger function: {function}")]
    Unsupported {
        /// The function name that was requested.
        function: String,
    },
}

impl BackendError {
    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    /// Creates a new `Fatal` error with the given message.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal { message: message.into(), source: None }
    }

    /// Creates a new `Fatal` error with a message and source error.
    #[must_use]
    pub fn fatal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Fatal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Unsupported` error for the given function name.
    #[must_use]
    pub fn unsupported(function: impl Into<String>) -> Self {
        Self::Unsupported { function: function.into() }
    }

    /// Returns `true` if re-issuing the same invocation may succeed.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors raised while encoding or decoding persisted bytes.
///
/// Codec failures are never retried: they indicate a corrupt payload or a
/// broken environment rather than contention.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The gzip encoder failed.
    #[error("Compression failed: {0}")]
    Compress(#[source] std::io::Error),

    /// The payload is not a valid gzip stream.
    #[error("Decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    /// A commit index was not exactly four bytes long.
    #[error("Commit index must be 4 bytes, got {len}")]
    InvalidIndexLength {
        /// Length of the received index payload.
        len: usize,
    },

    /// A count or record length does not fit the 4-byte length prefix.
    #[error("Length {len} does not fit a 4-byte length prefix")]
    LengthOverflow {
        /// The oversized length.
        len: usize,
    },

    /// A length-prefixed structure ended early.
    #[error("Truncated payload at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Offset at which the read was attempted.
        offset: usize,
        /// Number of bytes required.
        needed: usize,
        /// Number of bytes left in the payload.
        available: usize,
    },

    /// Bytes remained after the last declared record.
    #[error("{count} unexpected trailing bytes")]
    TrailingBytes {
        /// Number of bytes left over.
        count: usize,
    },

    /// A string record was not valid UTF-8.
    #[error("Invalid UTF-8 in string record: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(BackendError::conflict("status 11").is_conflict());
        assert!(!BackendError::fatal("chaincode panicked").is_conflict());
        assert!(!BackendError::unsupported("ReadCommit").is_conflict());
    }

    #[test]
    fn test_fatal_preserves_source() {
        let io = std::io::Error::other("socket closed");
        let err = BackendError::fatal_with_source("submit failed", io);

        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("socket closed"));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            BackendError::conflict("status 10").to_string(),
            "Write conflict: status 10"
        );
        assert_eq!(
            BackendError::unsupported("WriteCommitLog").to_string(),
            "Unsupported ledger function: WriteCommitLog"
        );
        assert_eq!(
            CodecError::InvalidIndexLength { len: 3 }.to_string(),
            "Commit index must be 4 bytes, got 3"
        );
    }
}
