//! Secondary backend over a contract-table ledger.
//!
//! The contract keeps every value in one table, indexed by the SHA-256 of a
//! row key (see [`keys`](crate::keys)). [`SecondaryBackend`] shapes calls for
//! that layout:
//!
//! - **invoke** pushes a contract action whose `rawArgs` hold index-encoded keys and base64 values
//! - **query** reads the table through its `sha256` index with both bounds set to the row hash,
//!   then base64-decodes the first row
//!
//! The contract has no commit log and no package listing; those functions
//! are reported as unsupported.
//!
//! Keys are index-encoded without their leading zero bytes, so keys that
//! differ only in leading zeros (`[0x00, b'a']` and `[b'a']`) share one row
//! here while the primary keeps them apart. The last write to either wins.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use ledger_kv_storage::{
    BackendError, BackendResult, LedgerBackend, LedgerFunction, NamingConvention,
};

use crate::{
    config::ContractTableConfig,
    keys::{
        LEDGER_ID_KEY, PACKAGE_PREFIX, RECORD_TIME_KEY, STATE_PREFIX, encode_index_key, row_hash,
        row_key,
    },
    transport::{ActionData, ContractAction, ContractClient, PermissionLevel, TableRowsRequest},
};

/// Index the contract table is read through.
const INDEX_POSITION: &str = "secondary";

/// Key type of that index.
const INDEX_KEY_TYPE: &str = "sha256";

/// [`LedgerBackend`] over a contract-table transport.
#[derive(Clone)]
pub struct SecondaryBackend {
    name: Arc<str>,
    table: ContractTableConfig,
    client: Arc<dyn ContractClient>,
}

impl SecondaryBackend {
    /// Creates a backend named `name` over `client`, using the default table.
    pub fn new(name: impl Into<Arc<str>>, client: Arc<dyn ContractClient>) -> Self {
        Self::with_table(name, ContractTableConfig::default(), client)
    }

    /// Creates a backend reading and writing the given table.
    pub fn with_table(
        name: impl Into<Arc<str>>,
        table: ContractTableConfig,
        client: Arc<dyn ContractClient>,
    ) -> Self {
        Self { name: name.into(), table, client }
    }

    /// Returns the table this backend uses.
    #[must_use]
    pub fn table(&self) -> &ContractTableConfig {
        &self.table
    }

    fn action(&self, name: &str, raw_args: Vec<String>) -> ContractAction {
        ContractAction {
            account: self.table.account.clone(),
            name: name.to_owned(),
            authorization: vec![PermissionLevel {
                actor: self.table.actor.clone(),
                permission: self.table.permission.clone(),
            }],
            data: ActionData { raw_args },
        }
    }

    fn rows_request(&self, hash: String) -> TableRowsRequest {
        TableRowsRequest {
            json: true,
            code: self.table.account.clone(),
            table: self.table.table.clone(),
            scope: self.table.scope.clone(),
            index_position: INDEX_POSITION.to_owned(),
            key_type: INDEX_KEY_TYPE.to_owned(),
            lower_bound: hash.clone(),
            upper_bound: hash,
        }
    }
}

impl std::fmt::Debug for SecondaryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecondaryBackend")
            .field("name", &self.name)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// Encodes `key, value, key, value, ...` for a keyed write action.
fn encode_pairs(function: &str, args: &[Vec<u8>]) -> BackendResult<Vec<String>> {
    if args.len() % 2 != 0 {
        return Err(BackendError::fatal(format!(
            "{function} expects key/value pairs, got {} arguments",
            args.len()
        )));
    }

    Ok(args
        .chunks_exact(2)
        .flat_map(|pair| [encode_index_key(&pair[0]), STANDARD.encode(&pair[1])])
        .collect())
}

#[async_trait]
impl LedgerBackend for SecondaryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn naming(&self) -> NamingConvention {
        NamingConvention::Contract
    }

    async fn invoke(&self, function: &str, args: &[Vec<u8>]) -> BackendResult<Vec<u8>> {
        let raw_args = match NamingConvention::Contract.resolve(function) {
            Some(
                LedgerFunction::RawWrite
                | LedgerFunction::RawBatchWrite
                | LedgerFunction::PackageWrite,
            ) => encode_pairs(function, args)?,
            Some(LedgerFunction::RecordTimeWrite | LedgerFunction::LedgerIdWrite) => {
                args.iter().map(|arg| STANDARD.encode(arg)).collect()
            },
            _ => return Err(BackendError::unsupported(function)),
        };

        tracing::trace!(backend = %self.name, function, args = raw_args.len(), "pushing action");
        self.client.push_action(self.action(function, raw_args)).await?;
        Ok(Vec::new())
    }

    async fn query(&self, function: &str, args: &[Vec<u8>]) -> BackendResult<Vec<u8>> {
        let row = match NamingConvention::Contract.resolve(function) {
            Some(LedgerFunction::RawRead) => row_key(STATE_PREFIX, &args.concat()),
            Some(LedgerFunction::PackageRead) => row_key(PACKAGE_PREFIX, &args.concat()),
            Some(LedgerFunction::RecordTimeRead) => RECORD_TIME_KEY.to_owned(),
            Some(LedgerFunction::LedgerIdRead) => LEDGER_ID_KEY.to_owned(),
            _ => return Err(BackendError::unsupported(function)),
        };

        let hash = row_hash(&row);
        tracing::trace!(backend = %self.name, function, row = %row, hash = %hash, "reading row");
        let rows = self.client.get_table_rows(self.rows_request(hash)).await?;

        match rows.rows.first() {
            Some(found) => STANDARD.decode(&found.value).map_err(|err| {
                BackendError::fatal_with_source(format!("row {row} holds invalid base64"), err)
            }),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::transport::{TableRow, TableRows, TransportError};

    #[derive(Default)]
    struct RecordingClient {
        actions: Mutex<Vec<ContractAction>>,
        requests: Mutex<Vec<TableRowsRequest>>,
        rows: Mutex<Vec<TableRow>>,
    }

    #[async_trait]
    impl ContractClient for RecordingClient {
        async fn push_action(&self, action: ContractAction) -> Result<(), TransportError> {
            self.actions.lock().push(action);
            Ok(())
        }

        async fn get_table_rows(
            &self,
            request: TableRowsRequest,
        ) -> Result<TableRows, TransportError> {
            self.requests.lock().push(request);
            Ok(TableRows { rows: self.rows.lock().clone(), more: false })
        }
    }

    fn backend() -> (SecondaryBackend, Arc<RecordingClient>) {
        let client = Arc::new(RecordingClient::default());
        (SecondaryBackend::new("eos", client.clone()), client)
    }

    #[tokio::test]
    async fn test_rawwrite_action_shape() {
        let (backend, client) = backend();

        backend.invoke("rawwrite", &[b"abc".to_vec(), b"value".to_vec()]).await.unwrap();

        let actions = client.actions.lock();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].account, "hello");
        assert_eq!(actions[0].name, "rawwrite");
        assert_eq!(
            actions[0].authorization,
            vec![PermissionLevel { actor: "hello".into(), permission: "active".into() }]
        );
        assert_eq!(actions[0].data.raw_args, vec!["YWJj".to_owned(), "dmFsdWU=".to_owned()]);
    }

    #[tokio::test]
    async fn test_scalar_writes_encode_every_argument() {
        let (backend, client) = backend();

        backend.invoke("recordtwrite", &[b"2024-01-01".to_vec()]).await.unwrap();

        assert_eq!(client.actions.lock()[0].data.raw_args, vec![STANDARD.encode("2024-01-01")]);
    }

    #[tokio::test]
    async fn test_odd_pair_count_is_fatal() {
        let (backend, client) = backend();

        let err = backend.invoke("rawbatchwrite", &[b"k".to_vec()]).await.unwrap_err();

        assert!(matches!(err, BackendError::Fatal { .. }));
        assert!(client.actions.lock().is_empty());
    }

    #[tokio::test]
    async fn test_chaincode_only_functions_are_unsupported() {
        let (backend, _client) = backend();

        for function in ["WriteCommitLog", "RawWrite", "RawRead"] {
            let err = backend.invoke(function, &[]).await.unwrap_err();
            assert!(matches!(err, BackendError::Unsupported { .. }), "{function}");
        }
        for function in ["ReadCommitHeight", "ReadCommit", "PackageListRead"] {
            let err = backend.query(function, &[]).await.unwrap_err();
            assert!(matches!(err, BackendError::Unsupported { .. }), "{function}");
        }
    }

    #[tokio::test]
    async fn test_query_bounds_both_ends_to_row_hash() {
        let (backend, client) = backend();

        let value = backend.query("RawRead", &[b"abc".to_vec()]).await.unwrap();
        assert!(value.is_empty());

        let requests = client.requests.lock();
        let expected = row_hash("DState:YWJj");
        assert_eq!(requests[0].lower_bound, expected);
        assert_eq!(requests[0].upper_bound, expected);
        assert_eq!(requests[0].index_position, "secondary");
        assert_eq!(requests[0].key_type, "sha256");
        assert_eq!(requests[0].code, "hello");
        assert_eq!(requests[0].table, "daml");
        assert!(requests[0].json);
    }

    #[tokio::test]
    async fn test_fixed_row_keys() {
        let (backend, client) = backend();

        backend.query("LedgerIDRead", &[]).await.unwrap();
        backend.query("RecordTimeRead", &[]).await.unwrap();

        let requests = client.requests.lock();
        assert_eq!(requests[0].lower_bound, row_hash(LEDGER_ID_KEY));
        assert_eq!(requests[1].lower_bound, row_hash(RECORD_TIME_KEY));
    }

    #[tokio::test]
    async fn test_query_decodes_first_row() {
        let (backend, client) = backend();
        client.rows.lock().push(TableRow {
            value: STANDARD.encode(b"ledger-1"),
            ..TableRow::default()
        });

        let value = backend.query("LedgerIDRead", &[]).await.unwrap();
        assert_eq!(value, b"ledger-1");
    }

    #[tokio::test]
    async fn test_invalid_base64_row_is_fatal() {
        let (backend, client) = backend();
        client.rows.lock().push(TableRow { value: "not base64!".into(), ..TableRow::default() });

        let err = backend.query("PackageRead", &[b"pkg".to_vec()]).await.unwrap_err();
        assert!(matches!(err, BackendError::Fatal { source: Some(_), .. }));
    }

    #[tokio::test]
    async fn test_custom_table() {
        let client = Arc::new(RecordingClient::default());
        let table = ContractTableConfig::builder().account("kvstore").table("state").build();
        let backend = SecondaryBackend::with_table("eos", table, client.clone());

        backend.invoke("ledgeridwrite", &[b"id".to_vec()]).await.unwrap();
        backend.query("LedgerIDRead", &[]).await.unwrap();

        assert_eq!(client.actions.lock()[0].account, "kvstore");
        assert_eq!(client.requests.lock()[0].code, "kvstore");
        assert_eq!(client.requests.lock()[0].table, "state");
    }
}
