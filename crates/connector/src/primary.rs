//! Primary backend over a chaincode ledger.
//!
//! [`PrimaryBackend`] passes function names and arguments through to a
//! [`ChaincodeClient`] unchanged: the chaincode deploys every ledger function
//! under its canonical name and takes raw byte arguments. What it adds is
//! error classification and the block event stream.

use std::sync::Arc;

use async_trait::async_trait;
use ledger_kv_storage::{BackendResult, BlockEvent, LedgerBackend, NamingConvention};
use tokio::sync::broadcast;

use crate::transport::ChaincodeClient;

/// [`LedgerBackend`] over a chaincode transport.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use ledger_kv_connector::{ChaincodeClient, PrimaryBackend};
///
/// fn primary(client: Arc<dyn ChaincodeClient>) -> PrimaryBackend {
///     PrimaryBackend::new("fabric", client)
/// }
/// ```
#[derive(Clone)]
pub struct PrimaryBackend {
    name: Arc<str>,
    client: Arc<dyn ChaincodeClient>,
}

impl PrimaryBackend {
    /// Creates a backend named `name` over `client`.
    pub fn new(name: impl Into<Arc<str>>, client: Arc<dyn ChaincodeClient>) -> Self {
        Self { name: name.into(), client }
    }
}

impl std::fmt::Debug for PrimaryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryBackend").field("name", &self.name).finish_non_exhaustive()
    }
}

#[async_trait]
impl LedgerBackend for PrimaryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn naming(&self) -> NamingConvention {
        NamingConvention::Chaincode
    }

    async fn invoke(&self, function: &str, args: &[Vec<u8>]) -> BackendResult<Vec<u8>> {
        Ok(self.client.submit_transaction(function, args).await?)
    }

    async fn query(&self, function: &str, args: &[Vec<u8>]) -> BackendResult<Vec<u8>> {
        Ok(self.client.evaluate_transaction(function, args).await?)
    }

    fn subscribe_blocks(&self) -> Option<broadcast::Receiver<BlockEvent>> {
        self.client.block_events()
    }
}
