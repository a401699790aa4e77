//! Transport client seams for the two ledger backends.
//!
//! The connector never speaks a ledger wire protocol itself. A
//! [`ChaincodeClient`] submits and evaluates chaincode transactions for the
//! primary ledger; a [`ContractClient`] pushes contract actions and reads
//! contract tables for the secondary ledger. Signing, endpoint discovery and
//! HTTP/gRPC plumbing live behind these traits.
//!
//! Transport failures are reported as [`TransportError`], which carries the
//! ledger's validation status code when there is one. The status is parsed
//! once, here, and turned into a typed [`BackendError`] on the way out.

use async_trait::async_trait;
use ledger_kv_storage::{BackendError, BlockEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Validation status codes that mark a read/write-set conflict at commit
/// time. Status 11 is `MVCC_READ_CONFLICT`.
pub const CONFLICT_STATUSES: [u32; 2] = [10, 11];

/// A failure reported by a transport client.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    /// Transaction validation status code, when the ledger reported one.
    pub status: Option<u32>,
    /// Description of the failure.
    pub message: String,
}

impl TransportError {
    /// Creates an error with an explicit status code.
    #[must_use]
    pub fn with_status(status: u32, message: impl Into<String>) -> Self {
        Self { status: Some(status), message: message.into() }
    }

    /// Creates an error from a ledger message, extracting the `status N`
    /// code it mentions. When the message carries several codes, a conflict
    /// code wins over the others; otherwise the first code is kept.
    ///
    /// # Examples
    ///
    /// ```
    /// use ledger_kv_connector::TransportError;
    ///
    /// let err = TransportError::from_message("transaction abc invalidated with status 11");
    /// assert_eq!(err.status, Some(11));
    /// assert!(err.is_conflict());
    ///
    /// let err = TransportError::from_message("connection refused");
    /// assert_eq!(err.status, None);
    /// ```
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self { status: parse_status(&message), message }
    }

    /// Returns `true` if the status marks a write conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.status.is_some_and(|status| CONFLICT_STATUSES.contains(&status))
    }
}

fn parse_status(message: &str) -> Option<u32> {
    let mut statuses = message.match_indices("status ").filter_map(|(at, marker)| {
        let rest = &message[at + marker.len()..];
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        rest[..end].parse::<u32>().ok()
    });

    let first = statuses.next()?;
    if CONFLICT_STATUSES.contains(&first) {
        return Some(first);
    }
    Some(statuses.find(|status| CONFLICT_STATUSES.contains(status)).unwrap_or(first))
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self { status: None, message: format!("malformed ledger response: {err}") }
    }
}

impl From<TransportError> for BackendError {
    fn from(err: TransportError) -> Self {
        if err.is_conflict() {
            BackendError::conflict(err.message)
        } else {
            BackendError::fatal_with_source(err.message.clone(), err)
        }
    }
}

/// Client for a chaincode-based ledger.
#[async_trait]
pub trait ChaincodeClient: Send + Sync {
    /// Endorses, orders and commits a transaction; resolves with the
    /// chaincode's result once the transaction is committed.
    async fn submit_transaction(
        &self,
        function: &str,
        args: &[Vec<u8>],
    ) -> Result<Vec<u8>, TransportError>;

    /// Evaluates a read-only chaincode function on a peer.
    async fn evaluate_transaction(
        &self,
        function: &str,
        args: &[Vec<u8>],
    ) -> Result<Vec<u8>, TransportError>;

    /// Subscribes to committed blocks, when the client can.
    fn block_events(&self) -> Option<broadcast::Receiver<BlockEvent>> {
        None
    }
}

/// Client for a contract-table ledger.
#[async_trait]
pub trait ContractClient: Send + Sync {
    /// Signs and pushes a single-action transaction.
    async fn push_action(&self, action: ContractAction) -> Result<(), TransportError>;

    /// Reads rows of a contract table.
    async fn get_table_rows(&self, request: TableRowsRequest) -> Result<TableRows, TransportError>;
}

/// One actor/permission pair authorizing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevel {
    /// Authorizing account.
    pub actor: String,
    /// Permission of that account.
    pub permission: String,
}

/// Arguments of a contract write action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionData {
    /// Text arguments. Keys are index-encoded, values are base64.
    #[serde(rename = "rawArgs")]
    pub raw_args: Vec<String>,
}

/// A contract action, as pushed to the contract ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAction {
    /// Account the contract is deployed to.
    pub account: String,
    /// Action name.
    pub name: String,
    /// Authorizations attached to the action.
    pub authorization: Vec<PermissionLevel>,
    /// Action arguments.
    pub data: ActionData,
}

/// A bounded read of a contract table through one of its indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRowsRequest {
    /// Ask for decoded rows rather than packed bytes.
    pub json: bool,
    /// Contract account.
    pub code: String,
    /// Table name.
    pub table: String,
    /// Table scope.
    pub scope: String,
    /// Which index to read through.
    pub index_position: String,
    /// Type of the index key.
    pub key_type: String,
    /// Inclusive lower bound.
    pub lower_bound: String,
    /// Inclusive upper bound.
    pub upper_bound: String,
}

/// One row of the contract table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableRow {
    /// Primary key.
    #[serde(default)]
    pub idx: u64,
    /// Full row key, prefix included.
    #[serde(default)]
    pub key: String,
    /// Hex SHA-256 of `key`.
    #[serde(default)]
    pub hash: String,
    /// Stored value, base64.
    pub value: String,
}

/// Rows returned by a table read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableRows {
    /// Matching rows, in index order.
    #[serde(default)]
    pub rows: Vec<TableRow>,
    /// Whether more rows matched than were returned.
    #[serde(default)]
    pub more: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_message_extracts_status() {
        let err = TransportError::from_message(
            "The Fabric transaction a1b2 was invalidated with status 10",
        );
        assert_eq!(err.status, Some(10));
        assert!(err.is_conflict());

        let err = TransportError::from_message("Chaincode returned status 500 (internal error)");
        assert_eq!(err.status, Some(500));
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_from_message_skips_markers_without_digits() {
        let err = TransportError::from_message("status unknown, retry with status 11");
        assert_eq!(err.status, Some(11));
    }

    #[test]
    fn test_from_message_prefers_later_conflict_code() {
        let err = TransportError::from_message(
            "proposal returned status 200; transaction invalidated with status 11",
        );
        assert_eq!(err.status, Some(11));
        assert!(err.is_conflict());

        let err = TransportError::from_message("status 500 after status 503");
        assert_eq!(err.status, Some(500));
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_from_message_does_not_match_longer_codes() {
        let err = TransportError::from_message("status 110");
        assert_eq!(err.status, Some(110));
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_conflict_maps_to_backend_conflict() {
        let err: BackendError = TransportError::with_status(11, "mvcc").into();
        assert!(err.is_conflict());

        let err: BackendError = TransportError::from_message("endorsement timeout").into();
        assert!(matches!(err, BackendError::Fatal { source: Some(_), .. }));
    }

    #[test]
    fn test_action_wire_format() {
        let action = ContractAction {
            account: "hello".into(),
            name: "rawwrite".into(),
            authorization: vec![PermissionLevel {
                actor: "hello".into(),
                permission: "active".into(),
            }],
            data: ActionData { raw_args: vec!["YWJj".into(), "dmFsdWU=".into()] },
        };

        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "account": "hello",
                "name": "rawwrite",
                "authorization": [{ "actor": "hello", "permission": "active" }],
                "data": { "rawArgs": ["YWJj", "dmFsdWU="] }
            })
        );
    }

    #[test]
    fn test_table_rows_tolerates_extra_fields() {
        let json = r#"{
            "rows": [{ "idx": 3, "key": "DLedgerID", "hash": "ab", "value": "aWQ=", "payer": "x" }],
            "more": false,
            "next_key": ""
        }"#;

        let rows: TableRows = serde_json::from_str(json).unwrap();
        assert_eq!(rows.rows.len(), 1);
        assert_eq!(rows.rows[0].value, "aWQ=");
        assert_eq!(rows.rows[0].idx, 3);
    }

    #[test]
    fn test_malformed_json_becomes_transport_error() {
        let err: TransportError =
            serde_json::from_str::<TableRows>("{ not json").unwrap_err().into();
        assert!(err.status.is_none());
        assert!(err.message.starts_with("malformed ledger response"));
    }
}
