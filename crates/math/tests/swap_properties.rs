//! Property tests for constant-product pricing and slippage bounds.

use num_bigint::BigUint;
use num_traits::Zero;
use pm_math::*;
use pm_types::{Asset, MarketError};
use proptest::prelude::*;

fn yes() -> Asset {
    Asset::ledger(880_001, 1)
}

fn no() -> Asset {
    Asset::ledger(880_002, 1)
}

prop_compose! {
    fn reserves_strategy()(
        input_reserve in 1u64..1_000_000_000_000u64,
        output_reserve in 1u64..1_000_000_000_000u64,
    ) -> (u64, u64) {
        (input_reserve, output_reserve)
    }
}

proptest! {
    /// Output stays strictly inside the output reserve, and the post-trade
    /// product never drops below k.
    #[test]
    fn prop_output_bounded_and_product_non_decreasing(
        (r_in, r_out) in reserves_strategy(),
        amount in 1u64..u64::MAX,
    ) {
        let pool = ReservePool::new(yes(), r_in.into(), no(), r_out.into()).unwrap();
        let amount = BigUint::from(amount);

        match quote_swap(&pool, &yes(), &amount) {
            Ok(quote) => {
                let r_in = BigUint::from(r_in);
                let r_out = BigUint::from(r_out);
                prop_assert!(!quote.output_amount.is_zero());
                prop_assert!(quote.output_amount < r_out);
                let after = (&r_in + &amount) * (&r_out - &quote.output_amount);
                prop_assert!(after >= &r_in * &r_out);
            }
            Err(MarketError::ZeroOutputError { computed_output, .. }) => {
                prop_assert!(computed_output.is_zero());
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    /// Applying the quoted trade to the pool keeps k non-decreasing.
    #[test]
    fn prop_executed_trade_preserves_invariant(
        (r_in, r_out) in reserves_strategy(),
        amount in 1u64..1_000_000_000u64,
    ) {
        let mut pool = ReservePool::new(yes(), r_in.into(), no(), r_out.into()).unwrap();
        let k_before = pool.product();
        if let Ok(quote) = quote_swap(&pool, &yes(), &BigUint::from(amount)) {
            pool.apply(&quote.pool_delta()).unwrap();
            prop_assert!(pool.product() >= k_before);
            prop_assert!(pool.is_funded());
        }
    }

    /// Larger inputs never yield less output.
    #[test]
    fn prop_output_monotonic_in_input(
        (r_in, r_out) in reserves_strategy(),
        amount in 1u64..1_000_000_000u64,
        extra in 1u64..1_000_000u64,
    ) {
        let pool = ReservePool::new(yes(), r_in.into(), no(), r_out.into()).unwrap();
        let small = quote_swap(&pool, &yes(), &BigUint::from(amount));
        let large = quote_swap(&pool, &yes(), &BigUint::from(amount + extra));
        if let (Ok(small), Ok(large)) = (small, large) {
            prop_assert!(large.output_amount >= small.output_amount);
        }
    }

    /// The slippage bound never exceeds the quoted output, and equals it at
    /// zero tolerance.
    #[test]
    fn prop_slippage_bound(
        (r_in, r_out) in reserves_strategy(),
        amount in 1u64..1_000_000_000u64,
        bps in 0u64..10_000u64,
    ) {
        let pool = ReservePool::new(yes(), r_in.into(), no(), r_out.into()).unwrap();
        if let Ok(quote) = quote_swap(&pool, &yes(), &BigUint::from(amount)) {
            let tolerance = SlippageTolerance::from_bps(bps).unwrap();
            let min_output = apply_slippage_bound(&quote, tolerance);
            prop_assert!(min_output <= quote.output_amount);
            prop_assert_eq!(apply_slippage_bound(&quote, SlippageTolerance::ZERO), quote.output_amount.clone());
            let bounded = quote.with_slippage(tolerance);
            prop_assert_eq!(bounded.min_output_amount, min_output);
        }
    }
}

#[test]
fn test_zero_inputs_never_quote() {
    let funded = ReservePool::new(yes(), 1000u32.into(), no(), 1000u32.into()).unwrap();
    let empty = ReservePool::empty(yes(), no()).unwrap();

    assert!(matches!(
        quote_swap(&funded, &yes(), &BigUint::zero()),
        Err(MarketError::ZeroOutputError { .. })
    ));
    assert!(matches!(
        quote_swap(&empty, &yes(), &BigUint::from(100u32)),
        Err(MarketError::ZeroOutputError { .. })
    ));
}

#[test]
fn test_sequence_of_swaps_is_exact() {
    // Alternating trades must land on the same reserves every run: no
    // floating point means no drift.
    let mut pool = ReservePool::new(yes(), 1_000_000u32.into(), no(), 1_000_000u32.into()).unwrap();
    for i in 0..50u32 {
        let input = if i % 2 == 0 { yes() } else { no() };
        let quote = quote_swap(&pool, &input, &BigUint::from(1_000u32 + i)).unwrap();
        pool.apply(&quote.pool_delta()).unwrap();
    }
    let k = pool.product();
    assert!(k >= BigUint::from(1_000_000_000_000u64));

    let mut replayed = ReservePool::new(yes(), 1_000_000u32.into(), no(), 1_000_000u32.into()).unwrap();
    for i in 0..50u32 {
        let input = if i % 2 == 0 { yes() } else { no() };
        let quote = quote_swap(&replayed, &input, &BigUint::from(1_000u32 + i)).unwrap();
        replayed.apply(&quote.pool_delta()).unwrap();
    }
    assert_eq!(replayed, pool);
}
