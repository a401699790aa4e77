//! Ledger backend trait definition.
//!
//! This module defines [`LedgerBackend`], the narrow call surface the
//! connector uses to reach a ledger. A backend exposes exactly two
//! operations, mirroring a chaincode/contract call surface:
//!
//! - **invoke**: submit a state-changing transaction and wait for the ledger to accept or reject it
//! - **query**: evaluate a read-only function and return its result
//!
//! Everything else (signing, ordering, peer networking, table layout) is the
//! backend's private business. In particular, each backend decides how a
//! logical key maps onto its own lookup mechanism, and each backend decides
//! which of its failures are write conflicts.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{error::BackendResult, function::NamingConvention};

/// Notification that the ledger committed a new block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockEvent {
    /// Height of the committed block.
    pub block_number: u64,
}

/// A ledger reachable through named invoke and query functions.
///
/// Implementations must be `Send + Sync`; the connector shares them across
/// tasks behind an [`Arc`](std::sync::Arc).
///
/// # Results
///
/// Both operations return the raw result bytes. An empty result from
/// [`query`](LedgerBackend::query) means "no data"; the connector maps it to
/// absence.
///
/// # Errors
///
/// A backend must classify its failures before returning them: conflicts
/// detected at commit time become
/// [`BackendError::Conflict`](crate::BackendError::Conflict), everything
/// else becomes [`BackendError::Fatal`](crate::BackendError::Fatal).
///
/// # Example
///
/// ```
/// use ledger_kv_storage::{LedgerBackend, MemoryLedger};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let ledger = MemoryLedger::new("primary");
///
/// ledger.invoke("RecordTimeWrite", &[b"2024-01-01T00:00:00Z".to_vec()]).await.unwrap();
/// let time = ledger.query("RecordTimeRead", &[]).await.unwrap();
/// assert_eq!(time, b"2024-01-01T00:00:00Z");
/// # });
/// ```
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Human-readable backend name, used in logs and errors.
    fn name(&self) -> &str;

    /// The function naming convention this backend is deployed with.
    fn naming(&self) -> NamingConvention;

    /// Submits a state-changing transaction.
    ///
    /// Resolves once the ledger has accepted or rejected the transaction.
    /// The result bytes are function-defined; `WriteCommitLog` returns the
    /// newly assigned index as a 4-byte little-endian integer.
    #[must_use = "ledger invocations may fail and errors must be handled"]
    async fn invoke(&self, function: &str, args: &[Vec<u8>]) -> BackendResult<Vec<u8>>;

    /// Evaluates a read-only function.
    ///
    /// Returns an empty vector when the ledger holds no data for the request.
    #[must_use = "ledger queries may fail and errors must be handled"]
    async fn query(&self, function: &str, args: &[Vec<u8>]) -> BackendResult<Vec<u8>>;

    /// Subscribes to block-commit notifications.
    ///
    /// Backends without a block event stream return `None` (the default).
    fn subscribe_blocks(&self) -> Option<broadcast::Receiver<BlockEvent>> {
        None
    }
}
