#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection.
//!
//! These tests require the `failpoints` feature:
//! ```bash
//! cargo test -p ledger-kv-connector --features failpoints --test failpoint_tests
//! ```

use std::{sync::Arc, time::Duration};

use ledger_kv_connector::{
    ConflictRetryConfig, ConnectorConfig, ConnectorError, KvConnector, MemoryContract,
    SecondaryBackend,
};
use ledger_kv_storage::{
    LedgerBackend, MemoryLedger,
    testutil::{FaultInjectingBackend, conflict_error},
};

fn fast_config() -> ConnectorConfig {
    ConnectorConfig::builder()
        .retry(ConflictRetryConfig::builder().backoff(Duration::ZERO).build().expect("retry"))
        .build()
        .expect("config")
}

async fn mirrored_connector(contract: &MemoryContract) -> KvConnector {
    let mirror: Arc<dyn LedgerBackend> =
        Arc::new(SecondaryBackend::new("eos", Arc::new(contract.clone())));
    KvConnector::builder()
        .config(fast_config())
        .primary(Arc::new(MemoryLedger::new("fabric")))
        .mirrors(vec![mirror])
        .build()
        .await
        .expect("connector should build")
}

#[tokio::test]
async fn mirror_write_failpoint_keeps_primary_value() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("mirror-write", "return").expect("failed to configure fail point");

    let contract = MemoryContract::new();
    let connector = mirrored_connector(&contract).await;
    let result = connector.put_value(b"key", b"value").await;

    match result {
        Err(ConnectorError::Mirror { backend, .. }) => assert_eq!(backend, "eos"),
        other => panic!("expected a mirror failure, got: {other:?}"),
    }
    assert_eq!(connector.get_value(b"key").await.expect("get"), Some(b"value".to_vec()));
    assert!(contract.actions().is_empty(), "mirror should not have been reached");

    scenario.teardown();
}

#[tokio::test]
async fn mirror_write_without_failpoint_succeeds() {
    let scenario = fail::FailScenario::setup();
    // No fail point configured, the mirror write goes through

    let contract = MemoryContract::new();
    let connector = mirrored_connector(&contract).await;
    connector.put_value(b"key", b"value").await.expect("put should succeed");

    assert_eq!(contract.actions().len(), 1);

    scenario.teardown();
}

#[tokio::test]
async fn conflict_retry_failpoint_stops_before_sleeping() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("conflict-retry-before-sleep", "return").expect("failed to configure fail point");

    let primary = FaultInjectingBackend::new("fabric");
    primary.fail_next_invokes(2, conflict_error());
    let connector = KvConnector::builder()
        .config(fast_config())
        .primary(Arc::new(primary.clone()))
        .build()
        .await
        .expect("connector should build");
    let result = connector.put_value(b"key", b"value").await;

    assert!(
        matches!(result, Err(ConnectorError::RetriesExhausted { attempts: 1, .. })),
        "retry loop should stop at the fail point, got: {result:?}"
    );
    assert_eq!(primary.invoke_count(), 1);

    scenario.teardown();
}

#[tokio::test]
async fn conflict_retry_without_failpoint_recovers() {
    let scenario = fail::FailScenario::setup();

    let primary = FaultInjectingBackend::new("fabric");
    primary.fail_next_invokes(2, conflict_error());
    let connector = KvConnector::builder()
        .config(fast_config())
        .primary(Arc::new(primary.clone()))
        .build()
        .await
        .expect("connector should build");
    connector.put_value(b"key", b"value").await.expect("put should succeed after retries");

    assert_eq!(primary.invoke_count(), 3);

    scenario.teardown();
}
