use std::sync::Arc;

use num_bigint::BigUint;
use pm_sdk::*;
use pm_test_utils::{oracle_key, test_config, trading_market, MockLedgerClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("Prediction Market SDK Basic Usage Example");
    println!("=========================================\n");

    // The in-memory ledger stands in for a real node connection
    let ledger = Arc::new(MockLedgerClient::new());
    let config = test_config();
    println!("SDK Configuration:");
    println!("  Network: {}", config.network);
    println!("  Swap output index: {}", config.destination_output_index);
    println!("  Default slippage: {} bps", config.default_slippage.bps());

    let lifecycle = MarketLifecycle::new(Arc::clone(&ledger), config)?;

    println!("\n=== Market Setup ===");
    let mut market = trading_market(&lifecycle, "btc-100k", 10_000).await?;
    println!("  Market: {}", market.id);
    println!("  YES asset: {}", market.yes_asset);
    println!("  NO asset: {}", market.no_asset);
    println!("  AMM contract: {}", market.contract);
    println!("  State: {}", market.state());

    println!("\n=== Quoting ===");
    for amount in [100u32, 1_000, 5_000] {
        let quote = lifecycle
            .quote(&market, &market.yes_asset, &BigUint::from(amount), None)
            .await?;
        println!(
            "  {} YES -> {} NO (min {}, impact {} bps)",
            amount,
            quote.output_amount,
            quote.min_output_amount,
            price_impact_bps(&quote)
        );
    }

    println!("\n=== Swap ===");
    let yes = market.yes_asset;
    let receipt = lifecycle
        .swap(&mut market, yes, BigUint::from(1_000u32), None)
        .await?;
    println!("  Swap TXID: {}", receipt.txid);
    println!(
        "  YES implied probability: {} bps",
        spot_price_bps(market.pool(), &market.yes_asset)?
    );

    println!("\n=== Resolution ===");
    let key = oracle_key();
    println!("  Oracle public key: {}", key.public_key());
    lifecycle.resolve(&mut market, Outcome::Yes, 880_000, &key).await?;
    println!("  State: {}", market.state());

    let claimable = lifecycle.claim_winnings(&market, &market.yes_asset).await?;
    println!("  Claimable YES balance: {}", claimable);

    Ok(())
}
