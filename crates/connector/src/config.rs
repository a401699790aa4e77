//! Configuration for the key-value connector.
//!
//! [`ConnectorConfig`] carries the local ledger identity, the bootstrap flag
//! and the [`ConflictRetryConfig`] applied to every write. The contract-table
//! backend is shaped by [`ContractTableConfig`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};

/// Ledger identity written on bootstrap when none is configured.
pub const DEFAULT_LEDGER_ID: &str = "fabric-ledger-server";

/// Default number of attempts per write, counting the first one.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default fixed sleep between conflicting attempts.
const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

/// Conflict retry settings applied independently to each backend write.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use ledger_kv_connector::ConflictRetryConfig;
///
/// let config = ConflictRetryConfig::builder()
///     .max_attempts(3)
///     .backoff(Duration::from_millis(100))
///     .build()?;
/// assert_eq!(config.max_attempts(), 3);
/// # Ok::<(), ledger_kv_connector::ConnectorError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConflictRetryConfig")]
pub struct ConflictRetryConfig {
    /// Total attempts, including the first.
    pub(crate) max_attempts: u32,

    /// Fixed sleep between attempts.
    #[serde(with = "humantime_serde")]
    pub(crate) backoff: Duration,
}

/// Unvalidated wire form of [`ConflictRetryConfig`].
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConflictRetryConfig {
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,

    #[serde(with = "humantime_serde", default = "default_backoff")]
    backoff: Duration,
}

impl TryFrom<RawConflictRetryConfig> for ConflictRetryConfig {
    type Error = ConnectorError;

    fn try_from(raw: RawConflictRetryConfig) -> Result<Self> {
        Self::builder().max_attempts(raw.max_attempts).backoff(raw.backoff).build()
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff() -> Duration {
    DEFAULT_BACKOFF
}

impl Default for ConflictRetryConfig {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, backoff: DEFAULT_BACKOFF }
    }
}

#[bon::bon]
impl ConflictRetryConfig {
    /// Creates a retry configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Config`] if `max_attempts` is zero.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_MAX_ATTEMPTS)] max_attempts: u32,
        #[builder(default = DEFAULT_BACKOFF)] backoff: Duration,
    ) -> Result<Self> {
        if max_attempts == 0 {
            return Err(ConnectorError::Config("max_attempts must be at least 1".into()));
        }

        Ok(Self { max_attempts, backoff })
    }

    /// Returns the total number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the sleep between attempts.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

/// Configuration for [`KvConnector`](crate::KvConnector).
///
/// # Example
///
/// ```
/// use ledger_kv_connector::ConnectorConfig;
///
/// let config = ConnectorConfig::builder()
///     .ledger_id("ledger-east-1")
///     .bootstrap(true)
///     .build()?;
/// assert_eq!(config.ledger_id(), "ledger-east-1");
/// # Ok::<(), ledger_kv_connector::ConnectorError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConnectorConfig")]
pub struct ConnectorConfig {
    /// Identity this process writes to every backend on bootstrap.
    pub(crate) ledger_id: String,

    /// Write `ledger_id` to every backend when the primary has none.
    pub(crate) bootstrap: bool,

    /// Conflict retry policy for writes.
    pub(crate) retry: ConflictRetryConfig,
}

/// Unvalidated wire form of [`ConnectorConfig`].
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConnectorConfig {
    #[serde(default = "default_ledger_id")]
    ledger_id: String,

    #[serde(default)]
    bootstrap: bool,

    #[serde(default)]
    retry: ConflictRetryConfig,
}

impl TryFrom<RawConnectorConfig> for ConnectorConfig {
    type Error = ConnectorError;

    fn try_from(raw: RawConnectorConfig) -> Result<Self> {
        Self::builder().ledger_id(raw.ledger_id).bootstrap(raw.bootstrap).retry(raw.retry).build()
    }
}

fn default_ledger_id() -> String {
    DEFAULT_LEDGER_ID.to_owned()
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            ledger_id: default_ledger_id(),
            bootstrap: false,
            retry: ConflictRetryConfig::default(),
        }
    }
}

#[bon::bon]
impl ConnectorConfig {
    /// Creates a connector configuration.
    ///
    /// # Optional Fields
    ///
    /// * `ledger_id` - Local ledger identity (default: `fabric-ledger-server`).
    /// * `bootstrap` - Write the identity on first start (default: false).
    /// * `retry` - Conflict retry policy (default: 5 attempts, 250ms apart).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Config`] if `ledger_id` is empty.
    #[builder]
    pub fn new(
        #[builder(into, default = default_ledger_id())] ledger_id: String,
        #[builder(default)] bootstrap: bool,
        #[builder(default)] retry: ConflictRetryConfig,
    ) -> Result<Self> {
        if ledger_id.is_empty() {
            return Err(ConnectorError::Config("ledger_id cannot be empty".into()));
        }

        Ok(Self { ledger_id, bootstrap, retry })
    }

    /// Returns the local ledger identity.
    #[must_use]
    pub fn ledger_id(&self) -> &str {
        &self.ledger_id
    }

    /// Returns whether bootstrap is enabled.
    #[must_use]
    pub fn bootstrap(&self) -> bool {
        self.bootstrap
    }

    /// Returns the conflict retry policy.
    #[must_use]
    pub fn retry(&self) -> &ConflictRetryConfig {
        &self.retry
    }
}

/// Where the contract-table backend keeps its rows and who signs its actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct ContractTableConfig {
    /// Account that owns the contract.
    #[serde(default = "default_contract_name")]
    #[builder(into, default = default_contract_name())]
    pub account: String,

    /// Table holding the rows.
    #[serde(default = "default_table")]
    #[builder(into, default = default_table())]
    pub table: String,

    /// Table scope.
    #[serde(default = "default_contract_name")]
    #[builder(into, default = default_contract_name())]
    pub scope: String,

    /// Actor authorizing each action.
    #[serde(default = "default_contract_name")]
    #[builder(into, default = default_contract_name())]
    pub actor: String,

    /// Permission level of the actor.
    #[serde(default = "default_permission")]
    #[builder(into, default = default_permission())]
    pub permission: String,
}

fn default_contract_name() -> String {
    "hello".to_owned()
}

fn default_table() -> String {
    "daml".to_owned()
}

fn default_permission() -> String {
    "active".to_owned()
}

impl Default for ContractTableConfig {
    fn default() -> Self {
        Self {
            account: default_contract_name(),
            table: default_table(),
            scope: default_contract_name(),
            actor: default_contract_name(),
            permission: default_permission(),
        }
    }
}
