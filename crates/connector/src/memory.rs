//! In-memory contract ledger.
//!
//! [`MemoryContract`] is a [`ContractClient`] that executes the write actions
//! of the key-value contract against an in-memory table and answers table
//! reads through the same hash index. Rows are keyed exactly the way the
//! deployed contract keys them, so a [`SecondaryBackend`](crate::SecondaryBackend)
//! over a `MemoryContract` exercises the real write/read key agreement.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ledger_kv_connector::{MemoryContract, SecondaryBackend};
//! use ledger_kv_storage::LedgerBackend;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let contract = MemoryContract::new();
//! let backend = SecondaryBackend::new("eos", Arc::new(contract.clone()));
//!
//! backend.invoke("rawwrite", &[b"k".to_vec(), b"v".to_vec()]).await.unwrap();
//! assert_eq!(backend.query("RawRead", &[b"k".to_vec()]).await.unwrap(), b"v");
//! assert_eq!(contract.row_count(), 1);
//! # });
//! ```

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    config::ContractTableConfig,
    keys::{LEDGER_ID_KEY, PACKAGE_PREFIX, RECORD_TIME_KEY, STATE_PREFIX, row_hash},
    transport::{
        ContractAction, ContractClient, TableRow, TableRows, TableRowsRequest, TransportError,
    },
};

#[derive(Debug, Default)]
struct ContractState {
    /// Rows by hex hash; the map order is the index order.
    rows: BTreeMap<String, TableRow>,
    next_idx: u64,
    actions: Vec<ContractAction>,
    push_failures: VecDeque<TransportError>,
}

impl ContractState {
    fn upsert(&mut self, key: String, value: String) {
        let hash = row_hash(&key);
        if let Some(row) = self.rows.get_mut(&hash) {
            row.value = value;
            return;
        }

        let idx = self.next_idx;
        self.next_idx += 1;
        self.rows.insert(hash.clone(), TableRow { idx, key, hash, value });
    }

    fn upsert_pairs(&mut self, prefix: &str, args: &[String]) {
        for pair in args.chunks_exact(2) {
            self.upsert(format!("{prefix}{}", pair[0]), pair[1].clone());
        }
    }

    fn upsert_fixed(&mut self, key: &str, args: &[String]) {
        for value in args {
            self.upsert(key.to_owned(), value.clone());
        }
    }
}

/// In-memory stand-in for the key-value contract.
///
/// Cheaply cloneable; all clones share one table.
#[derive(Debug, Clone)]
pub struct MemoryContract {
    table: ContractTableConfig,
    state: Arc<Mutex<ContractState>>,
}

impl MemoryContract {
    /// Creates an empty contract at the default table location.
    #[must_use]
    pub fn new() -> Self {
        Self::with_table(ContractTableConfig::default())
    }

    /// Creates an empty contract at the given table location.
    #[must_use]
    pub fn with_table(table: ContractTableConfig) -> Self {
        Self { table, state: Arc::new(Mutex::new(ContractState::default())) }
    }

    /// Fails the next `count` pushed actions with `error`, without applying them.
    pub fn fail_next_pushes(&self, count: usize, error: TransportError) {
        self.state.lock().push_failures.extend(std::iter::repeat_n(error, count));
    }

    /// Returns every applied action, in order.
    #[must_use]
    pub fn actions(&self) -> Vec<ContractAction> {
        self.state.lock().actions.clone()
    }

    /// Returns the number of rows in the table.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.state.lock().rows.len()
    }

    /// Returns the row stored under the full row key, if any.
    #[must_use]
    pub fn row(&self, key: &str) -> Option<TableRow> {
        self.state.lock().rows.get(&row_hash(key)).cloned()
    }
}

impl Default for MemoryContract {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContractClient for MemoryContract {
    async fn push_action(&self, action: ContractAction) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(error) = state.push_failures.pop_front() {
            return Err(error);
        }
        if action.account != self.table.account {
            return Err(TransportError::from_message(format!(
                "unknown contract account {}",
                action.account
            )));
        }

        let args = &action.data.raw_args;
        match action.name.as_str() {
            "rawwrite" | "rawbatchwrite" => state.upsert_pairs(STATE_PREFIX, args),
            "packagewrite" => state.upsert_pairs(PACKAGE_PREFIX, args),
            "recordtwrite" => state.upsert_fixed(RECORD_TIME_KEY, args),
            "ledgeridwrite" => state.upsert_fixed(LEDGER_ID_KEY, args),
            other => {
                return Err(TransportError::from_message(format!("unknown action {other}")));
            },
        }

        state.actions.push(action);
        Ok(())
    }

    async fn get_table_rows(&self, request: TableRowsRequest) -> Result<TableRows, TransportError> {
        if request.code != self.table.account
            || request.table != self.table.table
            || request.scope != self.table.scope
            || request.lower_bound > request.upper_bound
        {
            return Ok(TableRows::default());
        }

        let state = self.state.lock();
        let rows = state
            .rows
            .range(request.lower_bound..=request.upper_bound)
            .map(|(_, row)| row.clone())
            .collect();
        Ok(TableRows { rows, more: false })
    }
}
