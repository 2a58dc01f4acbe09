/// Constant-product swap quoting and slippage enforcement
///
/// A trade moves along the hyperbola `R_in * R_out = k`. The output is
///
/// ```text
/// out = floor(R_out - R_in * R_out / (R_in + a))
///     = R_out - ceil(R_in * R_out / (R_in + a))
/// ```
///
/// evaluated in exact integers, so the post-trade product never drops below
/// `k` and repeated trades cannot drift through rounding.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use pm_types::{
    amount::decimal, Asset, CallKind, MarketError, MarketResult, TransactionDescriptor, Transfer,
    BPS_DENOMINATOR, DEFAULT_POINTER, MAX_SLIPPAGE_BPS,
};

use crate::pool::ReservePool;

// ============================================================================
// Slippage Tolerance
// ============================================================================

/// Maximum accepted shortfall between quoted and executed output, in basis
/// points. Always below 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct SlippageTolerance(u64);

impl SlippageTolerance {
    pub const ZERO: Self = Self(0);

    pub fn from_bps(bps: u64) -> MarketResult<Self> {
        if bps >= MAX_SLIPPAGE_BPS {
            return Err(MarketError::InvalidSlippage {
                bps,
                max_bps: MAX_SLIPPAGE_BPS,
            });
        }
        Ok(Self(bps))
    }

    /// Whole-percent tolerance, e.g. `10` for 10%
    pub fn from_percent(percent: u64) -> MarketResult<Self> {
        let bps = percent.checked_mul(100).unwrap_or(u64::MAX);
        Self::from_bps(bps)
    }

    pub fn bps(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for SlippageTolerance {
    type Error = MarketError;

    fn try_from(bps: u64) -> MarketResult<Self> {
        Self::from_bps(bps)
    }
}

impl From<SlippageTolerance> for u64 {
    fn from(tolerance: SlippageTolerance) -> u64 {
        tolerance.0
    }
}

// ============================================================================
// Swap Quote
// ============================================================================

/// Output of a swap against a pool snapshot. Stale as soon as the pool moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub input_asset: Asset,
    pub output_asset: Asset,
    #[serde(with = "decimal")]
    pub input_amount: BigUint,
    #[serde(with = "decimal")]
    pub output_amount: BigUint,
    /// Equals `output_amount` until a slippage bound is applied
    #[serde(with = "decimal")]
    pub min_output_amount: BigUint,
    /// Reserves the quote was priced against
    #[serde(with = "decimal")]
    pub input_reserve: BigUint,
    #[serde(with = "decimal")]
    pub output_reserve: BigUint,
}

impl SwapQuote {
    /// Copy of the quote with `min_output_amount` bounded by `tolerance`
    pub fn with_slippage(mut self, tolerance: SlippageTolerance) -> Self {
        self.min_output_amount = min_output_for(&self.output_amount, tolerance);
        self
    }

    /// Signed reserve changes the trade applies when executed
    pub fn pool_delta(&self) -> BTreeMap<Asset, num_bigint::BigInt> {
        use num_bigint::{BigInt, Sign};

        let mut delta = BTreeMap::new();
        delta.insert(self.input_asset, BigInt::from(self.input_amount.clone()));
        delta.insert(
            self.output_asset,
            BigInt::from_biguint(Sign::Minus, self.output_amount.clone()),
        );
        delta
    }
}

// ============================================================================
// Quoting
// ============================================================================

/// Quote swapping `input_amount` of `input_asset` for the pool's other asset
pub fn quote_swap(
    pool: &ReservePool,
    input_asset: &Asset,
    input_amount: &BigUint,
) -> MarketResult<SwapQuote> {
    let output_asset = pool.counterpart(input_asset)?;
    let input_reserve = pool.reserve_of(input_asset)?.clone();
    let output_reserve = pool.reserve_of(&output_asset)?.clone();

    let zero_output = |computed_output: BigUint| MarketError::ZeroOutputError {
        input_asset: *input_asset,
        input_amount: input_amount.clone(),
        input_reserve: input_reserve.clone(),
        output_reserve: output_reserve.clone(),
        computed_output,
    };

    if input_amount.is_zero() || input_reserve.is_zero() || output_reserve.is_zero() {
        return Err(zero_output(BigUint::zero()));
    }

    let k = &input_reserve * &output_reserve;
    let new_input_reserve = &input_reserve + input_amount;
    let new_output_reserve = Integer::div_ceil(&k, &new_input_reserve);
    let output_amount = &output_reserve - &new_output_reserve;

    if output_amount.is_zero() {
        return Err(zero_output(output_amount));
    }

    tracing::debug!(
        input = %input_asset,
        output = %output_asset,
        %input_amount,
        %input_reserve,
        %output_reserve,
        %output_amount,
        "quoted swap"
    );

    Ok(SwapQuote {
        input_asset: *input_asset,
        output_asset,
        input_amount: input_amount.clone(),
        min_output_amount: output_amount.clone(),
        output_amount,
        input_reserve,
        output_reserve,
    })
}

/// Quote a collateral deposit into a mixed outcome/collateral pool.
///
/// Collateral is priced exactly like any other input asset.
pub fn quote_deposit(
    pool: &ReservePool,
    collateral: &Asset,
    deposit_amount: &BigUint,
) -> MarketResult<SwapQuote> {
    quote_swap(pool, collateral, deposit_amount)
}

/// `floor(output * (1 - tolerance))` in exact integers
pub fn apply_slippage_bound(quote: &SwapQuote, tolerance: SlippageTolerance) -> BigUint {
    min_output_for(&quote.output_amount, tolerance)
}

fn min_output_for(output_amount: &BigUint, tolerance: SlippageTolerance) -> BigUint {
    let keep = BPS_DENOMINATOR - tolerance.bps();
    (output_amount * keep) / BPS_DENOMINATOR
}

/// Descriptor for a swap call. Pure: the caller decides whether to submit.
pub fn build_swap_descriptor(
    contract: Asset,
    input_asset: Asset,
    input_amount: BigUint,
    min_output: BigUint,
    destination_output_index: u32,
) -> TransactionDescriptor {
    TransactionDescriptor {
        contract,
        call_kind: CallKind::Swap,
        pointer: DEFAULT_POINTER,
        asserted_min_output: Some(min_output),
        transfers: vec![Transfer {
            asset: input_asset,
            destination_output_index,
            amount: input_amount,
        }],
        oracle_commitment: None,
    }
}

// ============================================================================
// Price Helpers
// ============================================================================

/// Implied probability of `asset`'s outcome in basis points:
/// `R_other / (R_asset + R_other)`. Buying an outcome drains its reserve, so
/// a scarce reserve means a likely outcome.
pub fn spot_price_bps(pool: &ReservePool, asset: &Asset) -> MarketResult<u64> {
    let other = pool.counterpart(asset)?;
    let own_reserve = pool.reserve_of(asset)?;
    let other_reserve = pool.reserve_of(&other)?;
    let total = own_reserve + other_reserve;
    if total.is_zero() {
        return Ok(0);
    }
    let bps = (other_reserve * BPS_DENOMINATOR) / total;
    Ok(bps.to_u64().unwrap_or(BPS_DENOMINATOR))
}

/// Shortfall of the execution price against the pre-trade spot price, in
/// basis points of the spot output.
pub fn price_impact_bps(quote: &SwapQuote) -> u64 {
    if quote.input_reserve.is_zero() {
        return 0;
    }
    // spot output for the same input: a * R_out / R_in
    let spot_output = (&quote.input_amount * &quote.output_reserve) / &quote.input_reserve;
    if spot_output.is_zero() || quote.output_amount >= spot_output {
        return 0;
    }
    let shortfall = &spot_output - &quote.output_amount;
    ((shortfall * BPS_DENOMINATOR) / spot_output)
        .to_u64()
        .unwrap_or(BPS_DENOMINATOR)
}
