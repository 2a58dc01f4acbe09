use std::sync::{Arc, Once};

use num_bigint::BigUint;
use pm_math::ReservePool;
use pm_sdk::{ConfirmationPolicy, Market, MarketLifecycle, OracleKey, SdkConfig, SdkResult};
use pm_types::Asset;

use crate::constants::{ORACLE_PUBLIC_KEY_HEX, ORACLE_SECRET};
use crate::MockLedgerClient;

static TRACING: Once = Once::new();

/// Route `tracing` output to the test harness. Honors `RUST_LOG`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn yes_asset() -> Asset {
    Asset::ledger(870_001, 1)
}

pub fn no_asset() -> Asset {
    Asset::ledger(870_002, 1)
}

pub fn amm_contract() -> Asset {
    Asset::ledger(870_003, 1)
}

/// YES/NO pool with the given reserves
pub fn pool(yes_reserve: u64, no_reserve: u64) -> ReservePool {
    ReservePool::new(
        yes_asset(),
        BigUint::from(yes_reserve),
        no_asset(),
        BigUint::from(no_reserve),
    )
    .expect("fixture assets are distinct")
}

/// The fixture oracle key
pub fn oracle_key() -> OracleKey {
    OracleKey::from_bytes(&ORACLE_SECRET).expect("fixture key is valid")
}

/// Poll every millisecond, give up after five seconds
pub fn fast_confirmation() -> ConfirmationPolicy {
    ConfirmationPolicy {
        poll_interval_ms: 1,
        max_poll_interval_ms: 1,
        backoff_multiplier: 1,
        timeout_ms: Some(5_000),
    }
}

/// SDK config trusting the fixture oracle key
pub fn test_config() -> SdkConfig {
    SdkConfig::for_network("regtest")
        .with_oracle_public_key(ORACLE_PUBLIC_KEY_HEX)
        .with_confirmation(fast_confirmation())
}

pub fn lifecycle(ledger: &Arc<MockLedgerClient>) -> MarketLifecycle<MockLedgerClient> {
    MarketLifecycle::new(Arc::clone(ledger), test_config()).expect("test config is valid")
}

/// Create both outcome assets, mint them, create the AMM and deposit
/// `liquidity` of each side. The returned market is trading.
pub async fn trading_market(
    lifecycle: &MarketLifecycle<MockLedgerClient>,
    market_id: &str,
    liquidity: u64,
) -> SdkResult<Market> {
    let yes = lifecycle.create_outcome_asset(&format!("{}_yes", market_id)).await?;
    let no = lifecycle.create_outcome_asset(&format!("{}_no", market_id)).await?;
    lifecycle.mint_outcome(yes).await?;
    lifecycle.mint_outcome(no).await?;

    let mut market = lifecycle
        .create_amm(market_id, yes, no, &format!("AMM-{}", market_id))
        .await?;
    lifecycle
        .deposit_liquidity(&mut market, &BigUint::from(liquidity))
        .await?;
    Ok(market)
}
