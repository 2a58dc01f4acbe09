/// Prediction Market SDK
///
/// Runs binary-outcome markets on a constant-product AMM contract.
/// Provides:
/// - Oracle commitments (BIP340 Schnorr sign and verify)
/// - The `LedgerClient` port and confirmation polling
/// - The market aggregate and its state machine
/// - Lifecycle orchestration: asset and AMM creation, liquidity, swaps,
///   collateral deposits, resolution and claims
/// - Replay of confirmed ledger events

pub mod client;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod market;
pub mod oracle;
pub mod replay;

pub use client::*;
pub use config::*;
pub use errors::*;
pub use lifecycle::*;
pub use market::*;
pub use oracle::*;
pub use replay::*;

// Re-export shared types and pricing
pub use pm_math::*;
pub use pm_types::*;
