//! Shared test utilities for ledger backend testing.
//!
//! This module provides [`FaultInjectingBackend`], a wrapper that scripts
//! failures for upcoming calls and records every call it sees, plus small
//! data helpers. It is feature-gated behind `testutil` to prevent leaking
//! into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! ledger-kv-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use ledger_kv_storage::testutil::{FaultInjectingBackend, make_key};
//! ```

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::{
    backend::{BlockEvent, LedgerBackend},
    error::{BackendError, BackendResult},
    function::NamingConvention,
    memory::MemoryLedger,
};

/// Create a deterministic test key from a prefix and index.
///
/// Produces keys like `"prefix:000042"` encoded as UTF-8 bytes.
#[must_use]
pub fn make_key(prefix: &str, idx: usize) -> Vec<u8> {
    format!("{prefix}:{idx:06}").into_bytes()
}

/// Create a test value of the given size filled with `0xAB` bytes.
#[must_use]
pub fn make_value(size: usize) -> Vec<u8> {
    vec![0xAB; size]
}

/// A conflict error carrying the ledger's read/write-set conflict wording.
#[must_use]
pub fn conflict_error() -> BackendError {
    BackendError::conflict("transaction invalidated with status 11 (MVCC_READ_CONFLICT)")
}

/// Which operation a recorded call went through.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallKind {
    /// [`LedgerBackend::invoke`].
    Invoke,
    /// [`LedgerBackend::query`].
    Query,
}

/// One call observed by a [`FaultInjectingBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    /// Invoke or query.
    pub kind: CallKind,
    /// The function name as passed by the caller.
    pub function: String,
    /// The arguments as passed by the caller.
    pub args: Vec<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Script {
    invoke_failures: VecDeque<BackendError>,
    query_failures: VecDeque<BackendError>,
    always_fail_invoke: Option<BackendError>,
    calls: Vec<RecordedCall>,
}

/// A [`MemoryLedger`] wrapper with scripted failures and a call log.
///
/// Scripted failures are consumed in order, one per call, before the call
/// reaches the inner ledger. A failed call does not touch the ledger's
/// tables. Every call, failed or not, is recorded.
///
/// # Example
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use ledger_kv_storage::testutil::{FaultInjectingBackend, conflict_error};
///
/// let backend = FaultInjectingBackend::new("primary");
/// backend.fail_next_invokes(2, conflict_error());
/// ```
#[derive(Clone, Debug)]
pub struct FaultInjectingBackend {
    inner: MemoryLedger,
    script: Arc<Mutex<Script>>,
}

impl FaultInjectingBackend {
    /// Wraps a fresh chaincode-named [`MemoryLedger`].
    pub fn new(name: &str) -> Self {
        Self::wrap(MemoryLedger::new(name))
    }

    /// Wraps a fresh [`MemoryLedger`] with the given naming convention.
    pub fn with_naming(name: &str, naming: NamingConvention) -> Self {
        Self::wrap(MemoryLedger::with_naming(name, naming))
    }

    /// Wraps an existing ledger.
    pub fn wrap(inner: MemoryLedger) -> Self {
        Self { inner, script: Arc::new(Mutex::new(Script::default())) }
    }

    /// Returns the wrapped ledger.
    #[must_use]
    pub fn ledger(&self) -> &MemoryLedger {
        &self.inner
    }

    /// Fails the next `count` invocations with `error`.
    pub fn fail_next_invokes(&self, count: usize, error: BackendError) {
        let mut script = self.script.lock();
        script.invoke_failures.extend(std::iter::repeat_n(error, count));
    }

    /// Fails the next `count` queries with `error`.
    pub fn fail_next_queries(&self, count: usize, error: BackendError) {
        let mut script = self.script.lock();
        script.query_failures.extend(std::iter::repeat_n(error, count));
    }

    /// Fails every invocation with `error` until [`clear_failures`](Self::clear_failures).
    pub fn fail_all_invokes(&self, error: BackendError) {
        self.script.lock().always_fail_invoke = Some(error);
    }

    /// Drops every scripted failure.
    pub fn clear_failures(&self) {
        let mut script = self.script.lock();
        script.invoke_failures.clear();
        script.query_failures.clear();
        script.always_fail_invoke = None;
    }

    /// Returns every call recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().calls.clone()
    }

    /// Returns the recorded invocations of `function`.
    #[must_use]
    pub fn invocations_of(&self, function: &str) -> Vec<RecordedCall> {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|call| call.kind == CallKind::Invoke && call.function == function)
            .cloned()
            .collect()
    }

    /// Returns the number of invocations recorded so far.
    #[must_use]
    pub fn invoke_count(&self) -> usize {
        self.script.lock().calls.iter().filter(|call| call.kind == CallKind::Invoke).count()
    }

    /// Returns the number of queries recorded so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.script.lock().calls.iter().filter(|call| call.kind == CallKind::Query).count()
    }

    fn record(&self, kind: CallKind, function: &str, args: &[Vec<u8>]) -> Option<BackendError> {
        let mut script = self.script.lock();
        let call = RecordedCall { kind, function: function.to_owned(), args: args.to_vec() };
        script.calls.push(call);
        match kind {
            CallKind::Invoke => script
                .invoke_failures
                .pop_front()
                .or_else(|| script.always_fail_invoke.clone()),
            CallKind::Query => script.query_failures.pop_front(),
        }
    }
}

#[async_trait]
impl LedgerBackend for FaultInjectingBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn naming(&self) -> NamingConvention {
        self.inner.naming()
    }

    async fn invoke(&self, function: &str, args: &[Vec<u8>]) -> BackendResult<Vec<u8>> {
        if let Some(error) = self.record(CallKind::Invoke, function, args) {
            return Err(error);
        }
        self.inner.invoke(function, args).await
    }

    async fn query(&self, function: &str, args: &[Vec<u8>]) -> BackendResult<Vec<u8>> {
        if let Some(error) = self.record(CallKind::Query, function, args) {
            return Err(error);
        }
        self.inner.query(function, args).await
    }

    fn subscribe_blocks(&self) -> Option<broadcast::Receiver<BlockEvent>> {
        self.inner.subscribe_blocks()
    }
}
