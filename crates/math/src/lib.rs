/// Pricing math for the prediction market AMM
///
/// This crate provides the two-asset reserve pool and the constant-product
/// swap engine: quoting, slippage bounds and swap descriptors. Everything
/// here is synchronous and pure; all amounts are exact integers.

pub mod pool;
pub mod swap;

// Re-export commonly used items
pub use pool::*;
pub use swap::*;
