//! Market lifecycle against the in-memory ledger.

use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;
use num_traits::Zero;
use pm_sdk::*;
use pm_test_utils::{
    init_test_tracing, lifecycle, oracle_key, test_config, trading_market, MockLedgerClient,
};

fn ten_percent() -> Option<SlippageTolerance> {
    Some(SlippageTolerance::from_percent(10).unwrap())
}

fn setup() -> (Arc<MockLedgerClient>, MarketLifecycle<MockLedgerClient>) {
    init_test_tracing();
    let ledger = Arc::new(MockLedgerClient::new());
    let lifecycle = lifecycle(&ledger);
    (ledger, lifecycle)
}

#[tokio::test]
async fn test_full_market_lifecycle() {
    let (ledger, lifecycle) = setup();
    let mut market = trading_market(&lifecycle, "m1", 1000).await.unwrap();
    let (yes, no) = (market.yes_asset, market.no_asset);

    assert_eq!(market.state(), MarketState::Trading);
    assert_eq!(market.pool().reserve_of(&yes).unwrap(), &BigUint::from(1000u32));
    assert_eq!(ledger.balance(&yes), BigUint::from(99_000u32));

    let receipt = lifecycle
        .swap(&mut market, yes, BigUint::from(100u32), ten_percent())
        .await
        .unwrap();
    assert_eq!(receipt.quote.output_amount, BigUint::from(90u32));
    assert_eq!(receipt.quote.min_output_amount, BigUint::from(81u32));
    assert_eq!(market.pool().reserve_of(&yes).unwrap(), &BigUint::from(1100u32));
    assert_eq!(market.pool().reserve_of(&no).unwrap(), &BigUint::from(910u32));
    assert_eq!(ledger.balance(&no), BigUint::from(99_090u32));

    let swap = ledger.submitted().last().cloned().unwrap();
    assert_eq!(swap.call_kind, CallKind::Swap);
    assert_eq!(swap.asserted_min_output, Some(BigUint::from(81u32)));
    assert_eq!(swap.transfers[0].destination_output_index, 2);

    lifecycle
        .resolve(&mut market, Outcome::Yes, 880_500, &oracle_key())
        .await
        .unwrap();
    assert_eq!(market.state(), MarketState::Resolved);
    assert_eq!(ledger.resolution(&market.contract).as_ref(), market.resolution());

    let claimable = lifecycle.claim_winnings(&market, &yes).await.unwrap();
    assert_eq!(claimable, BigUint::from(98_900u32));
    let err = lifecycle.claim_winnings(&market, &no).await.unwrap_err();
    assert!(matches!(
        err,
        SdkError::Market(MarketError::NotWinningAsset { ref asset, .. }) if *asset == no
    ));

    let err = lifecycle
        .swap(&mut market, no, BigUint::from(10u32), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SdkError::Market(MarketError::MarketClosed { state: MarketState::Resolved, .. })
    ));

    lifecycle.settle(&mut market).unwrap();
    assert_eq!(market.state(), MarketState::Settled);
}

#[tokio::test]
async fn test_invalid_signature_keeps_market_trading() {
    let (ledger, lifecycle) = setup();
    let mut market = trading_market(&lifecycle, "m2", 1000).await.unwrap();
    let submitted_before = ledger.submitted().len();

    let impostor = OracleKey::from_bytes(&[42u8; 32]).unwrap();
    let forged = impostor.sign(&build_message("m2", Outcome::No, 880_500));
    let err = lifecycle.submit_resolution(&mut market, forged).await.unwrap_err();
    assert!(matches!(
        err,
        SdkError::Market(MarketError::InvalidOracleSignature { .. })
    ));

    // A genuine signature over another market's message is rejected too.
    let misdirected = oracle_key().sign(&build_message("other", Outcome::No, 880_500));
    assert!(lifecycle.submit_resolution(&mut market, misdirected).await.is_err());

    assert_eq!(market.state(), MarketState::Trading);
    assert!(market.resolution().is_none());
    assert_eq!(ledger.submitted().len(), submitted_before);
}

#[tokio::test]
async fn test_resolution_requires_trading() {
    let (_ledger, lifecycle) = setup();
    let yes = lifecycle.create_outcome_asset("early_yes").await.unwrap();
    let no = lifecycle.create_outcome_asset("early_no").await.unwrap();
    let mut market = lifecycle.create_amm("early", yes, no, "AMM-early").await.unwrap();
    assert_eq!(market.state(), MarketState::Created);

    let commitment = oracle_key().sign(&build_message("early", Outcome::Yes, 1));
    let err = lifecycle.submit_resolution(&mut market, commitment).await.unwrap_err();
    assert!(matches!(
        err,
        SdkError::Market(MarketError::InvalidTransition {
            from: MarketState::Created,
            to: MarketState::ResolutionPending,
            ..
        })
    ));

    let err = lifecycle
        .quote(&market, &yes, &BigUint::from(10u32), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Market(MarketError::MarketClosed { .. })));
}

#[tokio::test]
async fn test_deposit_checks_balances() {
    let (ledger, lifecycle) = setup();
    let yes = lifecycle.create_outcome_asset("poor_yes").await.unwrap();
    let no = lifecycle.create_outcome_asset("poor_no").await.unwrap();
    lifecycle.mint_outcome(yes).await.unwrap();
    let mut market = lifecycle.create_amm("poor", yes, no, "AMM-poor").await.unwrap();

    let err = lifecycle
        .deposit_liquidity(&mut market, &BigUint::from(500u32))
        .await
        .unwrap_err();
    match err {
        SdkError::Market(MarketError::InsufficientBalance {
            asset,
            available,
            required,
        }) => {
            assert_eq!(asset, no);
            assert!(available.is_zero());
            assert_eq!(required, BigUint::from(500u32));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(market.state(), MarketState::Created);
    assert!(ledger
        .submitted()
        .iter()
        .all(|d| d.contract != market.contract));
}

#[tokio::test]
async fn test_rejected_initial_funding_fails_market() {
    let (ledger, lifecycle) = setup();
    let yes = lifecycle.create_outcome_asset("rej_yes").await.unwrap();
    let no = lifecycle.create_outcome_asset("rej_no").await.unwrap();
    lifecycle.mint_outcome(yes).await.unwrap();
    lifecycle.mint_outcome(no).await.unwrap();
    let mut market = lifecycle.create_amm("rej", yes, no, "AMM-rej").await.unwrap();

    ledger.reject_next("contract paused");
    let err = lifecycle
        .deposit_liquidity(&mut market, &BigUint::from(100u32))
        .await
        .unwrap_err();
    assert!(err.is_rejection());
    assert_eq!(market.state(), MarketState::Failed);
}

#[tokio::test]
async fn test_stale_quote_rejected_by_min_output() {
    let (ledger, lifecycle) = setup();
    let mut market = trading_market(&lifecycle, "m3", 1000).await.unwrap();
    let yes = market.yes_asset;

    let quote = lifecycle
        .quote(&market, &yes, &BigUint::from(100u32), Some(SlippageTolerance::ZERO))
        .await
        .unwrap();
    let descriptor = build_swap_descriptor(
        market.contract,
        yes,
        quote.input_amount.clone(),
        quote.min_output_amount.clone(),
        lifecycle.config().destination_output_index,
    );

    // Someone else trades first.
    ledger.set_balance(yes, 1_000_000u32);
    let front_run = build_swap_descriptor(market.contract, yes, 500u32.into(), 0u32.into(), 2);
    ledger.apply_external(&front_run).unwrap();
    let moved = ledger.pool(&market.contract).unwrap();

    let err = lifecycle.submit_and_confirm(&descriptor).await.unwrap_err();
    assert!(matches!(err, SdkError::LedgerRejected { .. }));
    assert_eq!(ledger.pool(&market.contract).unwrap(), moved);

    // A rejected trade does not fail the market.
    let err = {
        ledger.reject_next("min_out_value not met");
        lifecycle
            .swap(&mut market, yes, BigUint::from(10u32), None)
            .await
            .unwrap_err()
    };
    assert!(err.is_rejection());
    assert_eq!(market.state(), MarketState::Trading);
}

#[tokio::test]
async fn test_resolution_rejected_fails_market() {
    let (ledger, lifecycle) = setup();
    let mut market = trading_market(&lifecycle, "m4", 1000).await.unwrap();

    ledger.reject_next("bad oracle");
    let err = lifecycle
        .resolve(&mut market, Outcome::No, 880_900, &oracle_key())
        .await
        .unwrap_err();
    assert!(err.is_rejection());
    assert_eq!(market.state(), MarketState::Failed);
    assert_eq!(market.resolution().unwrap().message.outcome, Outcome::No);
}

#[tokio::test]
async fn test_broadcast_failure_keeps_market_trading() {
    let (ledger, lifecycle) = setup();
    let mut market = trading_market(&lifecycle, "m5", 1000).await.unwrap();

    ledger.fail_next_broadcasts(1);
    let commitment = oracle_key().sign(&build_message("m5", Outcome::Yes, 1));
    let err = lifecycle
        .submit_resolution(&mut market, commitment.clone())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(market.state(), MarketState::Trading);

    let txid = lifecycle.submit_resolution(&mut market, commitment).await.unwrap();
    assert_eq!(market.state(), MarketState::ResolutionPending);
    lifecycle
        .confirm_resolution(&mut market, &txid, never_cancel())
        .await
        .unwrap();
    assert!(market.is_winning_asset(&market.yes_asset));
}

#[tokio::test(start_paused = true)]
async fn test_pending_resolution_survives_timeout_and_cancel() {
    init_test_tracing();
    let ledger = Arc::new(MockLedgerClient::new());
    let config = test_config().with_confirmation(ConfirmationPolicy {
        poll_interval_ms: 1_000,
        max_poll_interval_ms: 1_000,
        backoff_multiplier: 1,
        timeout_ms: Some(30_000),
    });
    let lifecycle = MarketLifecycle::new(Arc::clone(&ledger), config).unwrap();
    let mut market = trading_market(&lifecycle, "m6", 1000).await.unwrap();

    ledger.stall();
    let commitment = oracle_key().sign(&build_message("m6", Outcome::Yes, 7));
    let txid = lifecycle.submit_resolution(&mut market, commitment).await.unwrap();

    let err = lifecycle
        .confirm_resolution(&mut market, &txid, never_cancel())
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::ConfirmationTimeout { .. }));
    assert_eq!(market.state(), MarketState::ResolutionPending);

    let err = lifecycle
        .confirm_resolution(&mut market, &txid, tokio::time::sleep(Duration::from_secs(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Cancelled { .. }));
    assert_eq!(market.state(), MarketState::ResolutionPending);
}

#[tokio::test]
async fn test_deposit_collateral_through_collateral_pool() {
    let (ledger, lifecycle) = setup();
    let market = trading_market(&lifecycle, "m7", 1000).await.unwrap();
    let yes = market.yes_asset;
    let before = ledger.balance(&yes);

    let collateral_pool = Asset::ledger(990_000, 1);
    ledger.insert_pool(
        collateral_pool,
        ReservePool::new(Asset::Collateral, 1_000_000u32.into(), yes, 1000u32.into()).unwrap(),
    );
    ledger.set_balance(Asset::Collateral, 500_000u32);

    let receipt = lifecycle
        .deposit_collateral(
            &market,
            collateral_pool,
            Asset::Collateral,
            BigUint::from(100_000u32),
            ten_percent(),
        )
        .await
        .unwrap();
    assert_eq!(receipt.quote.output_asset, yes);
    assert_eq!(receipt.quote.output_amount, BigUint::from(90u32));
    assert_eq!(ledger.balance(&yes), before + 90u32);
    assert_eq!(ledger.balance(&Asset::Collateral), BigUint::from(400_000u32));

    let unrelated_pool = Asset::ledger(990_001, 1);
    ledger.insert_pool(
        unrelated_pool,
        ReservePool::new(Asset::Collateral, 1_000u32.into(), Asset::ledger(1, 1), 1000u32.into())
            .unwrap(),
    );
    let err = lifecycle
        .deposit_collateral(&market, unrelated_pool, Asset::Collateral, 10u32.into(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Market(MarketError::UnknownAsset { .. })));
}

#[tokio::test]
async fn test_zero_swap_is_rejected_before_submission() {
    let (ledger, lifecycle) = setup();
    let mut market = trading_market(&lifecycle, "m8", 1000).await.unwrap();
    let submitted = ledger.submitted().len();
    let yes = market.yes_asset;

    let err = lifecycle
        .swap(&mut market, yes, BigUint::zero(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Market(MarketError::ZeroOutputError { .. })));
    assert_eq!(ledger.submitted().len(), submitted);
}
