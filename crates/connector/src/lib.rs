//! Key-value connector persisting application state into ledgers.
//!
//! [`KvConnector`] maps key-value, commit-log, package, record-time and
//! ledger-identity operations onto named ledger functions of a primary
//! [`LedgerBackend`](ledger_kv_storage::LedgerBackend), retries write
//! conflicts, and mirrors every write to zero or more secondary backends.
//!
//! Two backends are provided:
//!
//! - [`PrimaryBackend`] over a [`ChaincodeClient`] (chaincode naming, raw byte arguments)
//! - [`SecondaryBackend`] over a [`ContractClient`] (contract naming, hashed table rows)
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use ledger_kv_connector::{ConnectorConfig, KvConnector, MemoryContract, SecondaryBackend};
//! use ledger_kv_storage::{LedgerBackend, MemoryLedger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mirror: Arc<dyn LedgerBackend> =
//!         Arc::new(SecondaryBackend::new("eos", Arc::new(MemoryContract::new())));
//!
//!     let connector = KvConnector::builder()
//!         .config(ConnectorConfig::builder().bootstrap(true).build()?)
//!         .primary(Arc::new(MemoryLedger::new("fabric")))
//!         .mirrors(vec![mirror])
//!         .build()
//!         .await?;
//!
//!     connector.put_package("pkg-1", b"archive").await?;
//!     assert_eq!(connector.get_package_list().await?, vec!["pkg-1".to_owned()]);
//!     assert_eq!(connector.get_ledger_id().await?.as_deref(), Some("fabric-ledger-server"));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`failpoints`**: Compiles the `fail` fail points (`conflict-retry-before-sleep`,
//!   `mirror-write`) in. Only for fault-injection tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connector;
pub mod error;
pub mod keys;
pub mod memory;
pub mod primary;
mod retry;
pub mod secondary;
pub mod transport;

// Re-export primary types at crate root for convenience
pub use config::{ConflictRetryConfig, ConnectorConfig, ContractTableConfig, DEFAULT_LEDGER_ID};
pub use connector::KvConnector;
pub use error::{ConnectorError, Result};
pub use memory::MemoryContract;
pub use primary::PrimaryBackend;
pub use secondary::SecondaryBackend;
pub use transport::{
    ActionData, ChaincodeClient, ContractAction, ContractClient, PermissionLevel, TableRow,
    TableRows, TableRowsRequest, TransportError,
};
