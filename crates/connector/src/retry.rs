//! Conflict retry for ledger writes.
//!
//! [`with_conflict_retry`] re-issues a write whose backend reported a
//! [`BackendError::Conflict`]. Attempts are separated by a fixed sleep and
//! bounded by [`ConflictRetryConfig::max_attempts`]. Any other backend error
//! ends the loop at once.
//!
//! Reads never go through this module.

use std::{future::Future, time::Duration};

use fail::fail_point;
use ledger_kv_storage::{BackendError, BackendResult, ConnectorMetrics};

use crate::{
    config::ConflictRetryConfig,
    error::{ConnectorError, Result},
};

/// Executes `operation` until it succeeds, fails with a non-conflict error,
/// or has been attempted `config.max_attempts()` times.
///
/// # Errors
///
/// - [`ConnectorError::Backend`] for the first non-conflict failure
/// - [`ConnectorError::RetriesExhausted`] carrying the last conflict when every attempt
///   conflicted
///
/// # Metrics
///
/// When `metrics` is provided, every re-issued attempt increments
/// `conflict_retry_count`, an exhausted budget increments
/// `retry_exhausted_count`, and a non-conflict failure increments
/// `fatal_error_count`.
#[tracing::instrument(
    skip(config, metrics, operation),
    fields(max_attempts = config.max_attempts())
)]
pub(crate) async fn with_conflict_retry<F, Fut, T>(
    config: &ConflictRetryConfig,
    metrics: Option<&ConnectorMetrics>,
    backend: &str,
    function: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BackendResult<T>>,
{
    let max_attempts = config.max_attempts();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(backend, function, attempt, "write succeeded after retry");
                }
                return Ok(value);
            },
            Err(err) if err.is_conflict() && attempt < max_attempts => {
                if let Some(m) = metrics {
                    m.record_conflict_retry();
                }
                tracing::debug!(
                    backend,
                    function,
                    attempt,
                    max_attempts,
                    delay_ms = millis(config.backoff()),
                    error = %err,
                    "write conflict, retrying after backoff",
                );
                fail_point!("conflict-retry-before-sleep", |_| {
                    Err(ConnectorError::RetriesExhausted {
                        backend: backend.to_owned(),
                        function: function.to_owned(),
                        attempts: attempt,
                        source: err.clone(),
                    })
                });
                tokio::time::sleep(config.backoff()).await;
                attempt += 1;
            },
            Err(err) if err.is_conflict() => {
                if let Some(m) = metrics {
                    m.record_retry_exhausted();
                }
                tracing::warn!(
                    backend,
                    function,
                    attempts = attempt,
                    error = %err,
                    "conflict retries exhausted",
                );
                return Err(ConnectorError::RetriesExhausted {
                    backend: backend.to_owned(),
                    function: function.to_owned(),
                    attempts: attempt,
                    source: err,
                });
            },
            Err(err) => {
                if let Some(m) = metrics {
                    m.record_fatal_error();
                }
                tracing::error!(backend, function, attempt, error = %err, "ledger write failed");
                return Err(backend_failure(backend, function, err));
            },
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Wraps a non-retryable backend error with the call it came from.
pub(crate) fn backend_failure(
    backend: &str,
    function: &str,
    source: BackendError,
) -> ConnectorError {
    ConnectorError::Backend { backend: backend.to_owned(), function: function.to_owned(), source }
}
