//! Connector metrics collection.
//!
//! [`ConnectorMetrics`] counts ledger traffic and the outcomes the retry
//! policy and the mirroring write path care about:
//!
//! - Invocations and queries, with cumulative latency in microseconds
//! - Conflict retries and exhausted retry budgets
//! - Fatal backend failures
//! - Mirror writes that failed after the primary write succeeded
//!
//! # Memory Ordering
//!
//! All counters are independent and monotonically increasing, so every
//! atomic operation uses `Ordering::Relaxed`. A [`snapshot`](ConnectorMetrics::snapshot)
//! reads counters one after another and may observe them slightly out of
//! step with each other, which is fine for telemetry.
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use ledger_kv_storage::ConnectorMetrics;
//!
//! let metrics = ConnectorMetrics::new();
//! metrics.record_invoke(Duration::from_micros(250));
//! metrics.record_conflict_retry();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.invoke_count, 1);
//! assert_eq!(snapshot.conflict_retry_count, 1);
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

#[derive(Debug, Default)]
struct MetricsInner {
    invoke_count: AtomicU64,
    invoke_latency_us: AtomicU64,
    query_count: AtomicU64,
    query_latency_us: AtomicU64,
    conflict_retry_count: AtomicU64,
    retry_exhausted_count: AtomicU64,
    fatal_error_count: AtomicU64,
    mirror_failure_count: AtomicU64,
}

/// Shared, lock-free connector counters.
///
/// Cheaply cloneable; all clones record into the same counters.
#[derive(Debug, Clone, Default)]
pub struct ConnectorMetrics {
    inner: Arc<MetricsInner>,
}

/// Point-in-time copy of [`ConnectorMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Ledger invocations attempted, including retries.
    pub invoke_count: u64,
    /// Cumulative invocation latency in microseconds.
    pub invoke_latency_us: u64,
    /// Ledger queries issued.
    pub query_count: u64,
    /// Cumulative query latency in microseconds.
    pub query_latency_us: u64,
    /// Invocations re-issued after a write conflict.
    pub conflict_retry_count: u64,
    /// Operations that ran out of conflict retries.
    pub retry_exhausted_count: u64,
    /// Non-retryable backend failures.
    pub fatal_error_count: u64,
    /// Mirror writes that failed after the primary write succeeded.
    pub mirror_failure_count: u64,
}

impl MetricsSnapshot {
    /// Average invocation latency in microseconds, or `0.0` with no samples.
    #[must_use]
    pub fn avg_invoke_latency_us(&self) -> f64 {
        average(self.invoke_latency_us, self.invoke_count)
    }

    /// Average query latency in microseconds, or `0.0` with no samples.
    #[must_use]
    pub fn avg_query_latency_us(&self) -> f64 {
        average(self.query_latency_us, self.query_count)
    }
}

fn average(total: u64, count: u64) -> f64 {
    if count == 0 { 0.0 } else { total as f64 / count as f64 }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl ConnectorMetrics {
    /// Creates a zeroed metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one ledger invocation attempt.
    pub fn record_invoke(&self, duration: Duration) {
        self.inner.invoke_count.fetch_add(1, Ordering::Relaxed);
        self.inner.invoke_latency_us.fetch_add(micros(duration), Ordering::Relaxed);
    }

    /// Records one ledger query.
    pub fn record_query(&self, duration: Duration) {
        self.inner.query_count.fetch_add(1, Ordering::Relaxed);
        self.inner.query_latency_us.fetch_add(micros(duration), Ordering::Relaxed);
    }

    /// Records that a conflicting invocation is about to be re-issued.
    pub fn record_conflict_retry(&self) {
        self.inner.conflict_retry_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records that an operation exhausted its conflict retries.
    pub fn record_retry_exhausted(&self) {
        self.inner.retry_exhausted_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a non-retryable backend failure.
    pub fn record_fatal_error(&self) {
        self.inner.fatal_error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a mirror write failure.
    pub fn record_mirror_failure(&self) {
        self.inner.mirror_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            invoke_count: inner.invoke_count.load(Ordering::Relaxed),
            invoke_latency_us: inner.invoke_latency_us.load(Ordering::Relaxed),
            query_count: inner.query_count.load(Ordering::Relaxed),
            query_latency_us: inner.query_latency_us.load(Ordering::Relaxed),
            conflict_retry_count: inner.conflict_retry_count.load(Ordering::Relaxed),
            retry_exhausted_count: inner.retry_exhausted_count.load(Ordering::Relaxed),
            fatal_error_count: inner.fatal_error_count.load(Ordering::Relaxed),
            mirror_failure_count: inner.mirror_failure_count.load(Ordering::Relaxed),
        }
    }

    /// Resets every counter to zero.
    ///
    /// Increments racing with a reset may be lost.
    pub fn reset(&self) {
        let inner = &self.inner;
        for counter in [
            &inner.invoke_count,
            &inner.invoke_latency_us,
            &inner.query_count,
            &inner.query_latency_us,
            &inner.conflict_retry_count,
            &inner.retry_exhausted_count,
            &inner.fatal_error_count,
            &inner.mirror_failure_count,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = ConnectorMetrics::new();
        let clone = metrics.clone();

        clone.record_query(Duration::from_micros(10));
        clone.record_mirror_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.query_count, 1);
        assert_eq!(snapshot.mirror_failure_count, 1);
    }

    #[test]
    fn test_average_latency() {
        let metrics = ConnectorMetrics::new();
        assert_eq!(metrics.snapshot().avg_invoke_latency_us(), 0.0);

        metrics.record_invoke(Duration::from_micros(100));
        metrics.record_invoke(Duration::from_micros(300));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.invoke_count, 2);
        assert_eq!(snapshot.avg_invoke_latency_us(), 200.0);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let metrics = ConnectorMetrics::new();
        metrics.record_invoke(Duration::from_millis(1));
        metrics.record_conflict_retry();
        metrics.record_retry_exhausted();
        metrics.record_fatal_error();

        metrics.reset();

        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
