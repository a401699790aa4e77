//! Ledger backend abstraction shared by the key-value connector.
//!
//! This crate provides the [`LedgerBackend`] trait and the pieces every
//! backend and the connector agree on: typed backend errors, the ledger
//! function table with its per-backend naming conventions, the value codec,
//! and the block-arrival [`ChangeNotifier`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │        (state reads/writes, commit log, package cache)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  ledger-kv-connector                        │
//! │   KvConnector │ conflict retry │ mirroring │ key shaping    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  ledger-kv-storage                          │
//! │   LedgerBackend trait (invoke, query) │ Codec │ Notifier    │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryLedger │  PrimaryBackend (chaincode)                  │
//! │   (testing)  │  SecondaryBackend (contract table)           │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use ledger_kv_storage::{LedgerBackend, MemoryLedger, codec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = MemoryLedger::new("primary");
//!
//!     let value = codec::compress(b"Alice")?;
//!     ledger.invoke("RawWrite", &[b"user:123".to_vec(), value]).await?;
//!
//!     let stored = ledger.query("RawRead", &[b"user:123".to_vec()]).await?;
//!     assert_eq!(codec::decompress(&stored)?, b"Alice");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with a fault-injecting backend and data
//!   helpers. Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod codec;
pub mod error;
pub mod function;
pub mod memory;
pub mod metrics;
pub mod notifier;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::{BlockEvent, LedgerBackend};
pub use error::{BackendError, BackendResult, BoxError, CodecError};
pub use function::{LedgerFunction, NamingConvention};
pub use memory::MemoryLedger;
pub use metrics::{ConnectorMetrics, MetricsSnapshot};
pub use notifier::ChangeNotifier;
pub use types::StateEntry;
