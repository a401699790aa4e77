//! Error types for the key-value connector.
//!
//! [`ConnectorError`] is what every [`KvConnector`](crate::KvConnector)
//! operation returns. It keeps the backend name and ledger function of the
//! failing call so a caller can tell a primary failure from a mirror
//! failure.

use ledger_kv_storage::{BackendError, CodecError};
use thiserror::Error;

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Errors surfaced by connector operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectorError {
    /// A non-retryable backend failure. Never retried.
    #[error("{backend} failed {function}: {source}")]
    Backend {
        /// Name of the backend that failed.
        backend: String,
        /// Ledger function that was called.
        function: String,
        /// The classified backend error.
        #[source]
        source: BackendError,
    },

    /// Every attempt hit a write conflict.
    #[error("{backend} failed {function} after {attempts} conflicting attempts: {source}")]
    RetriesExhausted {
        /// Name of the backend that kept conflicting.
        backend: String,
        /// Ledger function that was called.
        function: String,
        /// Number of attempts made.
        attempts: u32,
        /// The conflict reported by the last attempt.
        #[source]
        source: BackendError,
    },

    /// The primary write succeeded but a mirror write did not.
    ///
    /// The primary write is not rolled back.
    #[error("mirror {backend} did not complete the write: {source}")]
    Mirror {
        /// Name of the mirror backend.
        backend: String,
        /// Why the mirror write failed.
        #[source]
        source: Box<ConnectorError>,
    },

    /// Compression or binary decoding failed.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The backend answered with bytes the connector cannot interpret.
    #[error("Malformed {function} response: {message}")]
    MalformedResponse {
        /// Ledger function whose result was malformed.
        function: String,
        /// What was wrong with it.
        message: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConnectorError {
    /// Returns the underlying backend error, if this failure came from a
    /// backend call (looking through mirror failures).
    #[must_use]
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::Backend { source, .. } | Self::RetriesExhausted { source, .. } => Some(source),
            Self::Mirror { source, .. } => source.backend_error(),
            _ => None,
        }
    }

    /// Returns `true` if the primary write completed and only a mirror failed.
    #[must_use]
    pub fn is_mirror_failure(&self) -> bool {
        matches!(self, Self::Mirror { .. })
    }
}
