//! The key-value connector facade.
//!
//! [`KvConnector`] turns state, commit-log, package, record-time and
//! ledger-identity operations into ledger function calls. Values are
//! compressed on the way in and decompressed on the way out; an empty
//! stored value reads back as absent.
//!
//! # Write Path
//!
//! Every write goes through one path:
//!
//! 1. Invoke the function on the primary backend, retrying write conflicts.
//! 2. On success, invoke the same function on each mirror in order, under the mirror's own naming
//!    convention and its own retry budget. Mirrors that do not deploy the function are skipped.
//! 3. Report the first mirror failure, if any, as [`ConnectorError::Mirror`].
//!
//! A mirror failure never undoes the primary write.
//!
//! # Read Path
//!
//! Reads go to the primary backend only and are never retried.

use std::{sync::Arc, time::Instant};

use fail::fail_point;
use ledger_kv_storage::{
    BackendError, ChangeNotifier, ConnectorMetrics, LedgerBackend, LedgerFunction, StateEntry,
    codec,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::{
    config::ConnectorConfig,
    error::{ConnectorError, Result},
    retry::{backend_failure, with_conflict_retry},
};

/// Key-value connector over a primary ledger and any number of mirrors.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ledger_kv_connector::{ConnectorConfig, KvConnector};
/// use ledger_kv_storage::MemoryLedger;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let connector = KvConnector::builder()
///     .config(ConnectorConfig::default())
///     .primary(Arc::new(MemoryLedger::new("primary")))
///     .build()
///     .await?;
///
/// connector.put_value(b"contract:1", b"payload").await?;
/// assert_eq!(connector.get_value(b"contract:1").await?, Some(b"payload".to_vec()));
///
/// let index = connector.put_commit(b"tx-1").await?;
/// assert_eq!(index, 1);
/// assert_eq!(connector.get_commit_height().await?, 1);
/// # Ok::<(), ledger_kv_connector::ConnectorError>(())
/// # }).unwrap();
/// ```
pub struct KvConnector {
    config: ConnectorConfig,
    primary: Arc<dyn LedgerBackend>,
    mirrors: Vec<Arc<dyn LedgerBackend>>,
    metrics: Option<ConnectorMetrics>,
    notifier: ChangeNotifier,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for KvConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvConnector")
            .field("ledger_id", &self.config.ledger_id())
            .field("primary", &self.primary.name())
            .field("mirrors", &self.mirrors.iter().map(|m| m.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[bon::bon]
impl KvConnector {
    /// Creates a connector.
    ///
    /// When `config.bootstrap()` is set and the primary holds no ledger
    /// identity, the configured identity is written to the primary and to
    /// every mirror. Afterwards, if the primary publishes block events, a
    /// listener task starts raising the change notifier.
    ///
    /// # Optional Fields
    ///
    /// * `config` - Connector configuration (default: [`ConnectorConfig::default`]).
    /// * `mirrors` - Best-effort mirror backends, written in order (default: none).
    /// * `metrics` - Shared metrics collector.
    ///
    /// # Errors
    ///
    /// Returns an error if the bootstrap read or write fails.
    #[builder]
    pub async fn new(
        #[builder(default)] config: ConnectorConfig,
        primary: Arc<dyn LedgerBackend>,
        #[builder(default)] mirrors: Vec<Arc<dyn LedgerBackend>>,
        metrics: Option<ConnectorMetrics>,
    ) -> Result<Self> {
        let connector = Self {
            config,
            primary,
            mirrors,
            metrics,
            notifier: ChangeNotifier::new(),
            listener: Mutex::new(None),
        };

        if connector.config.bootstrap() {
            connector.bootstrap().await?;
        }

        // Subscribe after bootstrap so its own writes do not count as news.
        if let Some(events) = connector.primary.subscribe_blocks() {
            *connector.listener.lock() = Some(connector.notifier.listen(events));
        } else {
            tracing::debug!(backend = connector.primary.name(), "backend has no block stream");
        }

        Ok(connector)
    }

    /// Writes the local ledger identity everywhere if the primary has none.
    #[tracing::instrument(skip(self), fields(ledger_id = self.config.ledger_id()))]
    async fn bootstrap(&self) -> Result<()> {
        match self.get_ledger_id().await? {
            Some(existing) => {
                tracing::info!(existing = %existing, "ledger identity already present");
            },
            None => {
                self.put_ledger_id(self.config.ledger_id()).await?;
                tracing::info!("ledger identity written");
            },
        }

        match self.mirror_ledger_ids().await {
            Ok(ids) => {
                for (backend, id) in ids {
                    tracing::info!(backend = %backend, ledger_id = ?id, "mirror ledger identity");
                }
            },
            Err(err) => tracing::warn!(error = %err, "could not read mirror ledger identities"),
        }

        Ok(())
    }
}

impl KvConnector {
    /// Returns the connector configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Returns the metrics collector, if one was supplied.
    #[must_use]
    pub fn metrics(&self) -> Option<&ConnectorMetrics> {
        self.metrics.as_ref()
    }

    /// Returns the change notifier polled by [`check_new_blocks`](Self::check_new_blocks).
    ///
    /// Callers whose primary backend has no block stream can raise it from
    /// their own block source.
    #[must_use]
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Writes one state entry.
    #[tracing::instrument(
        skip(self, key, value),
        fields(key_len = key.len(), value_len = value.len())
    )]
    pub async fn put_value(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let value = codec::compress(value)?;
        self.write(LedgerFunction::RawWrite, &[key.to_vec(), value]).await?;
        Ok(())
    }

    /// Writes a batch of state entries as one transaction.
    ///
    /// Every value is compressed, and the entries are sent as one
    /// `key, value, key, value, ...` invocation retried as a unit. An empty
    /// batch sends nothing.
    #[tracing::instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn put_batch_and_commit(&self, entries: &[StateEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut args = Vec::with_capacity(entries.len() * 2);
        for entry in entries {
            args.push(entry.key.clone());
            args.push(codec::compress(&entry.value)?);
        }

        self.write(LedgerFunction::RawBatchWrite, &args).await?;
        Ok(())
    }

    /// Reads one state entry.
    #[tracing::instrument(skip(self, key), fields(key_len = key.len()))]
    pub async fn get_value(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let data = self.read(LedgerFunction::RawRead, &[key.to_vec()]).await?;
        decompressed(&data)
    }

    /// Appends a commit-log entry and returns its ledger-assigned index.
    #[tracing::instrument(skip(self, payload), fields(payload_len = payload.len()))]
    pub async fn put_commit(&self, payload: &[u8]) -> Result<u32> {
        let payload = codec::compress(payload)?;
        let result = self.write(LedgerFunction::WriteCommitLog, &[payload]).await?;
        decode_index(LedgerFunction::WriteCommitLog, &result)
    }

    /// Returns the highest assigned commit index, or 0 with an empty log.
    #[tracing::instrument(skip(self))]
    pub async fn get_commit_height(&self) -> Result<u32> {
        let result = self.read(LedgerFunction::ReadCommitHeight, &[]).await?;
        if result.is_empty() {
            return Ok(0);
        }
        decode_index(LedgerFunction::ReadCommitHeight, &result)
    }

    /// Reads the commit-log entry at `index` (1-based).
    #[tracing::instrument(skip(self))]
    pub async fn get_commit(&self, index: u32) -> Result<Option<Vec<u8>>> {
        let data = self.read(LedgerFunction::ReadCommit, &[index.to_string().into_bytes()]).await?;
        decompressed(&data)
    }

    /// Writes one package blob.
    #[tracing::instrument(skip(self, blob), fields(blob_len = blob.len()))]
    pub async fn put_package(&self, cache_key: &str, blob: &[u8]) -> Result<()> {
        let blob = codec::compress(blob)?;
        self.write(LedgerFunction::PackageWrite, &[cache_key.as_bytes().to_vec(), blob]).await?;
        Ok(())
    }

    /// Reads one package blob.
    #[tracing::instrument(skip(self))]
    pub async fn get_package(&self, cache_key: &str) -> Result<Option<Vec<u8>>> {
        let data = self.read(LedgerFunction::PackageRead, &[cache_key.as_bytes().to_vec()]).await?;
        decompressed(&data)
    }

    /// Lists the cache keys of every stored package.
    #[tracing::instrument(skip(self))]
    pub async fn get_package_list(&self) -> Result<Vec<String>> {
        let data = self.read(LedgerFunction::PackageListRead, &[]).await?;
        Ok(codec::decode_string_list(&data)?)
    }

    /// Records the latest ledger record time.
    #[tracing::instrument(skip(self))]
    pub async fn put_record_time(&self, time: &str) -> Result<()> {
        self.write(LedgerFunction::RecordTimeWrite, &[time.as_bytes().to_vec()]).await?;
        Ok(())
    }

    /// Returns the latest record time, if one was ever written.
    #[tracing::instrument(skip(self))]
    pub async fn get_record_time(&self) -> Result<Option<String>> {
        let data = self.read(LedgerFunction::RecordTimeRead, &[]).await?;
        utf8(LedgerFunction::RecordTimeRead, data)
    }

    /// Writes the ledger identity.
    #[tracing::instrument(skip(self))]
    pub async fn put_ledger_id(&self, ledger_id: &str) -> Result<()> {
        self.write(LedgerFunction::LedgerIdWrite, &[ledger_id.as_bytes().to_vec()]).await?;
        Ok(())
    }

    /// Returns the primary's ledger identity, if it has one.
    #[tracing::instrument(skip(self))]
    pub async fn get_ledger_id(&self) -> Result<Option<String>> {
        let data = self.read(LedgerFunction::LedgerIdRead, &[]).await?;
        utf8(LedgerFunction::LedgerIdRead, data)
    }

    /// Returns the identity this process writes on bootstrap.
    #[must_use]
    pub fn local_ledger_id(&self) -> &str {
        self.config.ledger_id()
    }

    /// Reads the ledger identity of every mirror, in mirror order.
    #[tracing::instrument(skip(self))]
    pub async fn mirror_ledger_ids(&self) -> Result<Vec<(String, Option<String>)>> {
        let mut ids = Vec::with_capacity(self.mirrors.len());
        for mirror in &self.mirrors {
            let data = self.query_on(mirror.as_ref(), LedgerFunction::LedgerIdRead, &[]).await?;
            ids.push((mirror.name().to_owned(), utf8(LedgerFunction::LedgerIdRead, data)?));
        }
        Ok(ids)
    }

    /// Returns whether new blocks arrived since the last call, and clears
    /// the flag. The first call after construction returns `true`.
    #[must_use]
    pub fn check_new_blocks(&self) -> bool {
        self.notifier.take()
    }

    /// Stops the block listener. Further block events are ignored.
    pub fn shutdown(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
            tracing::debug!("block listener stopped");
        }
    }

    /// Invokes `function` on the primary, then on every mirror that deploys it.
    async fn write(&self, function: LedgerFunction, args: &[Vec<u8>]) -> Result<Vec<u8>> {
        let primary = self.primary.as_ref();
        let Some(name) = primary.naming().function_name(function) else {
            return Err(unsupported(primary, function));
        };
        let result = self.invoke_with_retry(primary, name, args).await?;

        let mut first_failure = None;
        for mirror in &self.mirrors {
            let Some(name) = mirror.naming().function_name(function) else {
                tracing::debug!(
                    backend = mirror.name(),
                    %function,
                    "mirror does not deploy function, skipping",
                );
                continue;
            };

            if let Err(err) = self.mirror_write(mirror.as_ref(), name, args).await {
                if let Some(m) = &self.metrics {
                    m.record_mirror_failure();
                }
                tracing::warn!(
                    backend = mirror.name(),
                    %function,
                    error = %err,
                    "mirror write failed",
                );
                first_failure.get_or_insert(ConnectorError::Mirror {
                    backend: mirror.name().to_owned(),
                    source: Box::new(err),
                });
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }

    async fn mirror_write(
        &self,
        mirror: &dyn LedgerBackend,
        name: &str,
        args: &[Vec<u8>],
    ) -> Result<()> {
        fail_point!("mirror-write", |_| {
            let injected = BackendError::fatal("injected mirror failure");
            Err(backend_failure(mirror.name(), name, injected))
        });
        self.invoke_with_retry(mirror, name, args).await?;
        Ok(())
    }

    async fn invoke_with_retry(
        &self,
        backend: &dyn LedgerBackend,
        name: &str,
        args: &[Vec<u8>],
    ) -> Result<Vec<u8>> {
        let metrics = self.metrics.as_ref();
        with_conflict_retry(self.config.retry(), metrics, backend.name(), name, || async move {
            let start = Instant::now();
            let result = backend.invoke(name, args).await;
            if let Some(m) = metrics {
                m.record_invoke(start.elapsed());
            }
            result
        })
        .await
    }

    async fn read(&self, function: LedgerFunction, args: &[Vec<u8>]) -> Result<Vec<u8>> {
        self.query_on(self.primary.as_ref(), function, args).await
    }

    async fn query_on(
        &self,
        backend: &dyn LedgerBackend,
        function: LedgerFunction,
        args: &[Vec<u8>],
    ) -> Result<Vec<u8>> {
        let Some(name) = backend.naming().function_name(function) else {
            return Err(unsupported(backend, function));
        };

        let start = Instant::now();
        let result = backend.query(name, args).await;
        if let Some(m) = &self.metrics {
            m.record_query(start.elapsed());
        }

        result.map_err(|err| {
            if let Some(m) = &self.metrics {
                m.record_fatal_error();
            }
            tracing::error!(
                backend = backend.name(),
                function = name,
                error = %err,
                "ledger read failed",
            );
            backend_failure(backend.name(), name, err)
        })
    }
}

impl Drop for KvConnector {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

fn unsupported(backend: &dyn LedgerBackend, function: LedgerFunction) -> ConnectorError {
    backend_failure(
        backend.name(),
        &function.to_string(),
        BackendError::unsupported(function.to_string()),
    )
}

/// Decompresses a stored value; empty means absent.
fn decompressed(data: &[u8]) -> Result<Option<Vec<u8>>> {
    let value = codec::decompress(data)?;
    Ok(if value.is_empty() { None } else { Some(value) })
}

fn decode_index(function: LedgerFunction, data: &[u8]) -> Result<u32> {
    codec::decode_index(data).map_err(|err| ConnectorError::MalformedResponse {
        function: function.to_string(),
        message: err.to_string(),
    })
}

/// Interprets a scalar as UTF-8 text; empty means absent.
fn utf8(function: LedgerFunction, data: Vec<u8>) -> Result<Option<String>> {
    if data.is_empty() {
        return Ok(None);
    }
    String::from_utf8(data).map(Some).map_err(|err| ConnectorError::MalformedResponse {
        function: function.to_string(),
        message: err.to_string(),
    })
}
