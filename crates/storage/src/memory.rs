//! In-memory ledger implementation.
//!
//! This module provides [`MemoryLedger`], an in-memory implementation of
//! [`LedgerBackend`] that executes the full ledger function table. It is
//! suitable for tests and local development.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Separate tables**: State, packages, commit log, record time and ledger identity
//! - **Gap-free commit log**: Indices start at 1 and grow by exactly one per append
//! - **Block events**: Every accepted invocation commits one block and notifies subscribers
//! - **Either naming convention**: Chaincode (`RawWrite`) or contract (`rawwrite`) names
//!
//! # Example
//!
//! ```
//! use ledger_kv_storage::{LedgerBackend, MemoryLedger};
//!
//! #[tokio::main]
//! async fn main() {
//!     let ledger = MemoryLedger::new("primary");
//!
//!     let index = ledger.invoke("WriteCommitLog", &[b"first".to_vec()]).await.unwrap();
//!     assert_eq!(index, 1u32.to_le_bytes());
//!
//!     let entry = ledger.query("ReadCommit", &[b"1".to_vec()]).await.unwrap();
//!     assert_eq!(entry, b"first");
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - Invocations never conflict; wrap the ledger in a fault-injecting backend to simulate
//!   contention

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::{
    backend::{BlockEvent, LedgerBackend},
    codec::{encode_index, encode_string_list},
    error::{BackendError, BackendResult},
    function::{LedgerFunction, NamingConvention},
};

/// Capacity of the block event channel. Slow subscribers see a lag error,
/// not back-pressure.
const BLOCK_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct LedgerTables {
    state: HashMap<Vec<u8>, Vec<u8>>,
    packages: HashMap<String, Vec<u8>>,
    /// Package cache keys in first-write order.
    package_keys: Vec<String>,
    commits: Vec<Vec<u8>>,
    record_time: Vec<u8>,
    ledger_id: Vec<u8>,
    block_height: u64,
}

/// In-memory ledger executing the ledger function table.
///
/// # Cloning
///
/// `MemoryLedger` is cheaply cloneable via [`Arc`]. All clones share the
/// same tables and the same block event stream.
#[derive(Clone)]
pub struct MemoryLedger {
    name: Arc<str>,
    naming: NamingConvention,
    tables: Arc<RwLock<LedgerTables>>,
    blocks: broadcast::Sender<BlockEvent>,
}

impl fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLedger")
            .field("name", &self.name)
            .field("naming", &self.naming)
            .field("block_height", &self.block_height())
            .finish_non_exhaustive()
    }
}

impl MemoryLedger {
    /// Creates an empty ledger deployed under chaincode names.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::with_naming(name, NamingConvention::Chaincode)
    }

    /// Creates an empty ledger deployed under the given naming convention.
    pub fn with_naming(name: impl Into<Arc<str>>, naming: NamingConvention) -> Self {
        let (blocks, _) = broadcast::channel(BLOCK_CHANNEL_CAPACITY);
        Self {
            name: name.into(),
            naming,
            tables: Arc::new(RwLock::new(LedgerTables::default())),
            blocks,
        }
    }

    /// Returns the number of blocks committed so far.
    #[must_use]
    pub fn block_height(&self) -> u64 {
        self.tables.read().block_height
    }

    fn resolve(&self, function: &str) -> BackendResult<LedgerFunction> {
        self.naming.resolve(function).ok_or_else(|| BackendError::unsupported(function))
    }

    fn execute_write(&self, function: LedgerFunction, args: &[Vec<u8>]) -> BackendResult<Vec<u8>> {
        let mut tables = self.tables.write();

        let result = match function {
            LedgerFunction::RawWrite => {
                let [key, value] = expect_args::<2>(function, args)?;
                tables.state.insert(key.clone(), value.clone());
                Vec::new()
            },
            LedgerFunction::RawBatchWrite => {
                if args.len() % 2 != 0 {
                    return Err(BackendError::fatal(format!(
                        "{function} expects key/value pairs, got {} arguments",
                        args.len()
                    )));
                }
                for pair in args.chunks_exact(2) {
                    tables.state.insert(pair[0].clone(), pair[1].clone());
                }
                Vec::new()
            },
            LedgerFunction::WriteCommitLog => {
                let [payload] = expect_args::<1>(function, args)?;
                let index = u32::try_from(tables.commits.len() + 1)
                    .map_err(|_| BackendError::fatal("commit log is full"))?;
                tables.commits.push(payload.clone());
                encode_index(index).to_vec()
            },
            LedgerFunction::PackageWrite => {
                let [cache_key, blob] = expect_args::<2>(function, args)?;
                let cache_key = utf8_arg(function, cache_key)?;
                if tables.packages.insert(cache_key.clone(), blob.clone()).is_none() {
                    tables.package_keys.push(cache_key);
                }
                Vec::new()
            },
            LedgerFunction::RecordTimeWrite => {
                let [time] = expect_args::<1>(function, args)?;
                tables.record_time = time.clone();
                Vec::new()
            },
            LedgerFunction::LedgerIdWrite => {
                let [id] = expect_args::<1>(function, args)?;
                tables.ledger_id = id.clone();
                Vec::new()
            },
            _ => {
                return Err(BackendError::fatal(format!(
                    "{function} is read-only and cannot be invoked"
                )));
            },
        };

        tables.block_height += 1;
        let block_number = tables.block_height;
        drop(tables);

        // No subscribers is not an error.
        let _ = self.blocks.send(BlockEvent { block_number });
        Ok(result)
    }

    fn execute_read(&self, function: LedgerFunction, args: &[Vec<u8>]) -> BackendResult<Vec<u8>> {
        let tables = self.tables.read();

        match function {
            LedgerFunction::RawRead => {
                let [key] = expect_args::<1>(function, args)?;
                Ok(tables.state.get(key).cloned().unwrap_or_default())
            },
            LedgerFunction::ReadCommitHeight => {
                expect_args::<0>(function, args)?;
                if tables.commits.is_empty() {
                    return Ok(Vec::new());
                }
                let height = u32::try_from(tables.commits.len())
                    .map_err(|_| BackendError::fatal("commit log is full"))?;
                Ok(encode_index(height).to_vec())
            },
            LedgerFunction::ReadCommit => {
                let [index] = expect_args::<1>(function, args)?;
                let index: usize = utf8_arg(function, index)?.parse().map_err(|e| {
                    let message = format!("{function} expects a decimal index");
                    BackendError::fatal_with_source(message, e)
                })?;
                Ok(index
                    .checked_sub(1)
                    .and_then(|i| tables.commits.get(i))
                    .cloned()
                    .unwrap_or_default())
            },
            LedgerFunction::PackageRead => {
                let [cache_key] = expect_args::<1>(function, args)?;
                let cache_key = utf8_arg(function, cache_key)?;
                Ok(tables.packages.get(&cache_key).cloned().unwrap_or_default())
            },
            LedgerFunction::PackageListRead => {
                expect_args::<0>(function, args)?;
                encode_string_list(&tables.package_keys).map_err(|e| {
                    BackendError::fatal_with_source(format!("{function} cannot encode list"), e)
                })
            },
            LedgerFunction::RecordTimeRead => {
                expect_args::<0>(function, args)?;
                Ok(tables.record_time.clone())
            },
            LedgerFunction::LedgerIdRead => {
                expect_args::<0>(function, args)?;
                Ok(tables.ledger_id.clone())
            },
            _ => {
                Err(BackendError::fatal(format!("{function} changes state and cannot be queried")))
            },
        }
    }
}

fn expect_args<const N: usize>(
    function: LedgerFunction,
    args: &[Vec<u8>],
) -> BackendResult<&[Vec<u8>; N]> {
    args.try_into().map_err(|_| {
        BackendError::fatal(format!("{function} expects {N} arguments, got {}", args.len()))
    })
}

fn utf8_arg(function: LedgerFunction, arg: &[u8]) -> BackendResult<String> {
    String::from_utf8(arg.to_vec())
        .map_err(|e| BackendError::fatal_with_source(format!("{function} expects UTF-8"), e))
}

#[async_trait]
impl LedgerBackend for MemoryLedger {
    fn name(&self) -> &str {
        &self.name
    }

    fn naming(&self) -> NamingConvention {
        self.naming
    }

    async fn invoke(&self, function: &str, args: &[Vec<u8>]) -> BackendResult<Vec<u8>> {
        let function = self.resolve(function)?;
        self.execute_write(function, args)
    }

    async fn query(&self, function: &str, args: &[Vec<u8>]) -> BackendResult<Vec<u8>> {
        let function = self.resolve(function)?;
        self.execute_read(function, args)
    }

    fn subscribe_blocks(&self) -> Option<broadcast::Receiver<BlockEvent>> {
        Some(self.blocks.subscribe())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::codec::{decode_index, decode_string_list};

    fn args(items: &[&[u8]]) -> Vec<Vec<u8>> {
        items.iter().map(|item| item.to_vec()).collect()
    }

    #[tokio::test]
    async fn test_raw_read_missing_key_is_empty() {
        let ledger = MemoryLedger::new("test");
        let value = ledger.query("RawRead", &args(&[b"missing"])).await.unwrap();
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn test_raw_write_overwrites() {
        let ledger = MemoryLedger::new("test");
        ledger.invoke("RawWrite", &args(&[b"k", b"v1"])).await.unwrap();
        ledger.invoke("RawWrite", &args(&[b"k", b"v2"])).await.unwrap();

        assert_eq!(ledger.query("RawRead", &args(&[b"k"])).await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_batch_write_applies_all_pairs() {
        let ledger = MemoryLedger::new("test");
        ledger.invoke("RawBatchWrite", &args(&[b"a", b"1", b"b", b"2"])).await.unwrap();

        assert_eq!(ledger.query("RawRead", &args(&[b"a"])).await.unwrap(), b"1");
        assert_eq!(ledger.query("RawRead", &args(&[b"b"])).await.unwrap(), b"2");
        assert_eq!(ledger.block_height(), 1);
    }

    #[tokio::test]
    async fn test_batch_write_rejects_odd_arguments() {
        let ledger = MemoryLedger::new("test");
        let result = ledger.invoke("RawBatchWrite", &args(&[b"a", b"1", b"b"])).await;

        assert!(matches!(result, Err(BackendError::Fatal { .. })));
        assert_eq!(ledger.block_height(), 0);
    }

    #[tokio::test]
    async fn test_commit_log_indices_are_contiguous() {
        let ledger = MemoryLedger::new("test");
        assert!(ledger.query("ReadCommitHeight", &[]).await.unwrap().is_empty());

        for expected in 1..=3u32 {
            let index = ledger.invoke("WriteCommitLog", &args(&[b"entry"])).await.unwrap();
            assert_eq!(decode_index(&index).unwrap(), expected);
        }

        let height = ledger.query("ReadCommitHeight", &[]).await.unwrap();
        assert_eq!(decode_index(&height).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_read_commit_out_of_range_is_empty() {
        let ledger = MemoryLedger::new("test");
        ledger.invoke("WriteCommitLog", &args(&[b"only"])).await.unwrap();

        assert!(ledger.query("ReadCommit", &args(&[b"0"])).await.unwrap().is_empty());
        assert!(ledger.query("ReadCommit", &args(&[b"2"])).await.unwrap().is_empty());
        assert_eq!(ledger.query("ReadCommit", &args(&[b"1"])).await.unwrap(), b"only");
    }

    #[tokio::test]
    async fn test_read_commit_rejects_non_decimal_index() {
        let ledger = MemoryLedger::new("test");
        let result = ledger.query("ReadCommit", &args(&[b"one"])).await;
        assert!(matches!(result, Err(BackendError::Fatal { .. })));
    }

    #[tokio::test]
    async fn test_package_list_keeps_first_write_order() {
        let ledger = MemoryLedger::new("test");
        ledger.invoke("PackageWrite", &args(&[b"pkg-b", b"blob"])).await.unwrap();
        ledger.invoke("PackageWrite", &args(&[b"pkg-a", b"blob"])).await.unwrap();
        ledger.invoke("PackageWrite", &args(&[b"pkg-b", b"newer"])).await.unwrap();

        let list = ledger.query("PackageListRead", &[]).await.unwrap();
        assert_eq!(decode_string_list(&list).unwrap(), ["pkg-b", "pkg-a"]);
        assert_eq!(ledger.query("PackageRead", &args(&[b"pkg-b"])).await.unwrap(), b"newer");
    }

    #[tokio::test]
    async fn test_contract_naming_resolves_lowercase_writes() {
        let ledger = MemoryLedger::with_naming("mirror", NamingConvention::Contract);
        ledger.invoke("rawwrite", &args(&[b"k", b"v"])).await.unwrap();

        assert_eq!(ledger.query("RawRead", &args(&[b"k"])).await.unwrap(), b"v");
        assert!(matches!(
            ledger.invoke("RawWrite", &args(&[b"k", b"v"])).await,
            Err(BackendError::Unsupported { .. })
        ));
        assert!(matches!(
            ledger.invoke("WriteCommitLog", &args(&[b"x"])).await,
            Err(BackendError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_reads_and_writes_are_not_interchangeable() {
        let ledger = MemoryLedger::new("test");
        assert!(ledger.invoke("RawRead", &args(&[b"k"])).await.is_err());
        assert!(ledger.query("RawWrite", &args(&[b"k", b"v"])).await.is_err());
    }

    #[tokio::test]
    async fn test_every_accepted_invocation_emits_a_block() {
        let ledger = MemoryLedger::new("test");
        let mut blocks = ledger.subscribe_blocks().expect("memory ledger streams blocks");

        ledger.invoke("RecordTimeWrite", &args(&[b"t1"])).await.unwrap();
        ledger.invoke("LedgerIDWrite", &args(&[b"ledger"])).await.unwrap();

        assert_eq!(blocks.recv().await.unwrap(), BlockEvent { block_number: 1 });
        assert_eq!(blocks.recv().await.unwrap(), BlockEvent { block_number: 2 });
    }
}
