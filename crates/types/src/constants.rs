/// Protocol constants used across the prediction market crates

// ============================================================================
// Slippage Constants
// ============================================================================

/// Basis points denominator (10,000 = 100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Exclusive upper bound for a slippage tolerance. A 100% tolerance would
/// assert a minimum output of zero, which the ledger treats as no assertion.
pub const MAX_SLIPPAGE_BPS: u64 = BPS_DENOMINATOR;

/// Default slippage tolerance (10%)
pub const DEFAULT_SLIPPAGE_BPS: u64 = 1_000;

// ============================================================================
// Ledger Message Constants
// ============================================================================

/// Output that receives contract-call results in every message we build
pub const DEFAULT_POINTER: u32 = 1;

/// Output index that receives the swapped asset
pub const DEFAULT_SWAP_OUTPUT_INDEX: u32 = 2;

/// Output index that receives liquidity change and minted tokens
pub const DEFAULT_LIQUIDITY_OUTPUT_INDEX: u32 = 1;

/// Ticker used for the collateral sentinel in asset keys
pub const COLLATERAL_TICKER: &str = "BTC";

// ============================================================================
// Outcome Asset Constants
// ============================================================================

/// Divisibility of outcome assets and AMM shares
pub const OUTCOME_DIVISIBILITY: u8 = 18;

/// Amount released per free mint of an outcome asset
pub const OUTCOME_AMOUNT_PER_MINT: u64 = 100_000;

/// Contracts go live immediately
pub const DEFAULT_LIVE_TIME: u64 = 0;

/// Ratio model name understood by the ledger's collateralized mint
pub const CONSTANT_PRODUCT_RATIO_MODEL: &str = "constant_product";

// ============================================================================
// Confirmation Constants
// ============================================================================

/// Interval between confirmation polls
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Ceiling for the backed-off poll interval
pub const DEFAULT_MAX_POLL_INTERVAL_MS: u64 = 30_000;
