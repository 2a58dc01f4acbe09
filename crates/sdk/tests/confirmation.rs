//! Confirmation polling: backoff, timeout and cancellation run on paused
//! time so they finish instantly.

use std::time::Duration;

use pm_sdk::*;
use pm_test_utils::{init_test_tracing, MockLedgerClient};

fn policy(timeout_ms: Option<u64>) -> ConfirmationPolicy {
    ConfirmationPolicy {
        poll_interval_ms: 1_000,
        max_poll_interval_ms: 8_000,
        backoff_multiplier: 2,
        timeout_ms,
    }
}

async fn submit(ledger: &MockLedgerClient) -> TransactionId {
    ledger
        .submit_contract_creation(&ContractCreation::outcome_asset("poll_test"))
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_confirms_after_backoff() {
    init_test_tracing();
    let ledger = MockLedgerClient::new();
    ledger.set_confirmation_delay(3);
    let txid = submit(&ledger).await;

    let started = tokio::time::Instant::now();
    let confirmed = await_confirmation(&ledger, &txid, &policy(None), never_cancel())
        .await
        .unwrap();
    assert_eq!(confirmed.txid, txid);
    assert_eq!(ledger.poll_count(), 4);
    // 1s + 2s + 4s between the four polls
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(7) && elapsed < Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_times_out() {
    init_test_tracing();
    let ledger = MockLedgerClient::new();
    ledger.stall();
    let txid = submit(&ledger).await;

    let err = await_confirmation(&ledger, &txid, &policy(Some(60_000)), never_cancel())
        .await
        .unwrap_err();
    match err {
        SdkError::ConfirmationTimeout { txid: timed_out, elapsed } => {
            assert_eq!(timed_out, txid);
            assert!(elapsed >= Duration::from_secs(60));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_wins_without_timeout() {
    init_test_tracing();
    let ledger = MockLedgerClient::new();
    ledger.stall();
    let txid = submit(&ledger).await;

    let cancel = tokio::time::sleep(Duration::from_secs(3_600));
    let err = await_confirmation(&ledger, &txid, &policy(None), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Cancelled { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_errors_are_retried() {
    init_test_tracing();
    let ledger = MockLedgerClient::new();
    let txid = submit(&ledger).await;
    ledger.fail_next_polls(2);

    let confirmed = await_confirmation(&ledger, &txid, &policy(Some(60_000)), never_cancel())
        .await
        .unwrap();
    assert_eq!(confirmed.location().unwrap(), Asset::ledger(pm_test_utils::MOCK_START_BLOCK, 1));
}

#[tokio::test(start_paused = true)]
async fn test_rejection_ends_wait_immediately() {
    init_test_tracing();
    let ledger = MockLedgerClient::new();
    ledger.reject_next("malformed message");
    let txid = submit(&ledger).await;

    let err = await_confirmation(&ledger, &txid, &policy(None), never_cancel())
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::LedgerRejected { ref reason, .. } if reason == "malformed message"));
    assert_eq!(ledger.poll_count(), 1);
}
