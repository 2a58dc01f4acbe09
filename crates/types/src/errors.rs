use num_bigint::{BigInt, BigUint};
use thiserror::Error;

use crate::asset::Asset;
use crate::market::MarketState;

// ============================================================================
// Main Error Enum
// ============================================================================

/// Errors raised by pricing, pool accounting, oracle commitments and the
/// market state machine. Each variant carries the values needed to debug a
/// pricing dispute after the fact.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    // ========================================================================
    // Pool Errors
    // ========================================================================
    /// A delta referenced an asset the pool does not track
    #[error("Unknown asset {asset}: pool tracks {tracked:?}")]
    UnknownAsset { asset: Asset, tracked: Vec<Asset> },

    /// A pool must track exactly two distinct assets
    #[error("Pool arity violated: tracks {tracked:?}, rejected {rejected:?}")]
    PoolArityError {
        tracked: Vec<Asset>,
        rejected: Option<Asset>,
    },

    /// A reserve would go negative
    #[error("Invariant violation on {asset}: reserve {reserve} cannot absorb delta {delta}")]
    InvariantViolation {
        asset: Asset,
        reserve: BigUint,
        delta: BigInt,
    },

    // ========================================================================
    // Swap Errors
    // ========================================================================
    /// The computed output is zero (zero input, empty reserve, or dust trade)
    #[error(
        "Zero output swapping {input_amount} of {input_asset}: \
         input reserve {input_reserve}, output reserve {output_reserve}, computed output {computed_output}"
    )]
    ZeroOutputError {
        input_asset: Asset,
        input_amount: BigUint,
        input_reserve: BigUint,
        output_reserve: BigUint,
        computed_output: BigUint,
    },

    /// The swap input asset is not one of the pool's assets
    #[error("Asset {asset} not in pool: pool tracks {tracked:?}")]
    AssetNotInPool { asset: Asset, tracked: Vec<Asset> },

    /// Slippage tolerance outside [0, 10000) basis points
    #[error("Invalid slippage tolerance {bps} bps: expected less than {max_bps}")]
    InvalidSlippage { bps: u64, max_bps: u64 },

    /// Wallet cannot cover a liquidity deposit
    #[error("Insufficient balance of {asset}: have {available}, need {required}")]
    InsufficientBalance {
        asset: Asset,
        available: BigUint,
        required: BigUint,
    },

    // ========================================================================
    // Oracle Errors
    // ========================================================================
    /// Oracle commitment failed verification against the configured key
    #[error("Invalid oracle signature for market '{market_id}'")]
    InvalidOracleSignature { market_id: String },

    /// Secret or public key bytes could not be parsed
    #[error("Invalid oracle key: {reason}")]
    InvalidKey { reason: String },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Trading is not permitted in the current state
    #[error("Market '{market_id}' is closed for trading (state {state:?})")]
    MarketClosed { market_id: String, state: MarketState },

    /// The state machine does not permit this transition
    #[error("Invalid transition for market '{market_id}': {from:?} -> {to:?}")]
    InvalidTransition {
        market_id: String,
        from: MarketState,
        to: MarketState,
    },

    /// Claim attempted with the losing (or an unrelated) asset
    #[error("Asset {asset} is not the winning asset of market '{market_id}'")]
    NotWinningAsset { market_id: String, asset: Asset },

    /// Asset identifier could not be parsed
    #[error("Invalid asset '{value}': {reason}")]
    InvalidAsset { value: String, reason: String },

    /// A confirmed ledger event could not be applied during replay
    #[error("Replay failed at event {index}: {reason}")]
    ReplayError { index: usize, reason: String },
}

impl MarketError {
    /// Create an invalid asset error
    pub fn invalid_asset(value: &str, reason: &str) -> Self {
        Self::InvalidAsset {
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(reason: impl ToString) -> Self {
        Self::InvalidKey {
            reason: reason.to_string(),
        }
    }

    /// Create a replay error
    pub fn replay(index: usize, reason: impl ToString) -> Self {
        Self::ReplayError {
            index,
            reason: reason.to_string(),
        }
    }

    /// Whether the error came from pricing math rather than state or keys.
    /// Pricing errors are never retried: a retry would price against
    /// different reserves.
    pub fn is_pricing_error(&self) -> bool {
        matches!(
            self,
            Self::ZeroOutputError { .. }
                | Self::AssetNotInPool { .. }
                | Self::InvalidSlippage { .. }
                | Self::InvariantViolation { .. }
        )
    }
}

/// Result type alias using the shared error type
pub type MarketResult<T> = std::result::Result<T, MarketError>;
