/// Shared types for the binary-outcome prediction market
///
/// This crate provides asset identifiers, exact amounts, the market state
/// machine's states, oracle messages and the transaction descriptors exchanged
/// with the ledger client. Pricing lives in `pm-math`, signing and lifecycle
/// orchestration in `pm-sdk`.

pub mod amount;
pub mod asset;
pub mod constants;
pub mod descriptor;
pub mod errors;
pub mod market;
pub mod oracle;

// Re-export all public types
pub use amount::*;
pub use asset::*;
pub use constants::*;
pub use descriptor::*;
pub use errors::*;
pub use market::*;
pub use oracle::*;
