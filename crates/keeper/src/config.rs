use std::fs;
use std::path::Path;

use pm_math::SlippageTolerance;
use pm_sdk::{ConfirmationPolicy, OracleKey, SdkConfig, DEFAULT_SLIPPAGE_BPS};
use pm_types::Asset;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{KeeperError, KeeperResult};

/// Environment variable holding the oracle secret unless configured otherwise
pub const DEFAULT_ORACLE_KEY_ENV: &str = "PM_ORACLE_KEY";

/// Keeper configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeeperConfig {
    /// Ledger network the markets live on
    pub network: String,

    /// Environment variable holding the oracle's hex secret key
    #[serde(default = "default_oracle_key_env")]
    pub oracle_key_env: String,

    /// Expected oracle public key; checked against the loaded secret
    #[serde(default)]
    pub oracle_public_key: Option<String>,

    /// Seconds between pool refreshes in `Keeper::run`
    pub poll_interval_secs: u64,

    /// Slippage applied to trades the keeper quotes
    pub default_slippage_bps: u64,

    /// Confirmation polling
    #[serde(default)]
    pub confirmation: ConfirmationPolicy,

    /// Retry configuration
    pub retry: RetryConfig,

    /// List of markets to monitor and resolve
    pub markets: Vec<MarketConfig>,
}

/// Configuration for individual market
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketConfig {
    /// Market name for logging
    pub name: String,

    /// Identifier signed into oracle messages
    pub market_id: String,

    /// AMM contract, as `"<block>:<order>"`
    #[serde(with = "asset_text")]
    pub contract: Asset,

    #[serde(with = "asset_text")]
    pub yes_asset: Asset,

    #[serde(with = "asset_text")]
    pub no_asset: Asset,

    /// Priority level (higher = refreshed first)
    pub priority: u8,

    /// Whether this market is enabled
    pub enabled: bool,
}

/// Retry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum number of retries for failed operations
    pub max_retries: u32,

    /// Base delay between retries in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
}

fn default_oracle_key_env() -> String {
    DEFAULT_ORACLE_KEY_ENV.to_string()
}

impl KeeperConfig {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> KeeperResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            KeeperError::IoError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: KeeperConfig = toml::from_str(&content).map_err(|e| {
            KeeperError::SerializationError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> KeeperResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| {
            KeeperError::SerializationError(format!("Failed to serialize config: {}", e))
        })?;
        fs::write(path, content).map_err(|e| {
            KeeperError::IoError(format!("Failed to write config file {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> KeeperResult<()> {
        if self.network.trim().is_empty() {
            return Err(KeeperError::invalid_parameter("network", "empty", "non-empty string"));
        }

        if self.oracle_key_env.trim().is_empty() {
            return Err(KeeperError::invalid_parameter("oracle_key_env", "empty", "variable name"));
        }

        if self.poll_interval_secs == 0 {
            return Err(KeeperError::invalid_parameter("poll_interval_secs", "0", "greater than 0"));
        }

        SlippageTolerance::from_bps(self.default_slippage_bps)?;

        if self.markets.is_empty() {
            return Err(KeeperError::invalid_parameter("markets", "empty", "at least one market"));
        }

        for market in &self.markets {
            market.validate()?;
        }

        let mut ids: Vec<_> = self.markets.iter().map(|m| m.market_id.as_str()).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(KeeperError::invalid_parameter("market_id", pair[0], "unique per market"));
        }

        self.retry.validate()?;
        self.sdk_config().validate()?;

        Ok(())
    }

    /// Get enabled markets sorted by priority
    pub fn get_enabled_markets(&self) -> Vec<&MarketConfig> {
        let mut markets: Vec<_> = self.markets.iter().filter(|m| m.enabled).collect();

        markets.sort_by(|a, b| b.priority.cmp(&a.priority));
        markets
    }

    /// SDK configuration derived from this keeper configuration
    pub fn sdk_config(&self) -> SdkConfig {
        let mut sdk = SdkConfig::for_network(self.network.clone())
            .with_confirmation(self.confirmation.clone());
        if let Ok(slippage) = SlippageTolerance::from_bps(self.default_slippage_bps) {
            sdk.default_slippage = slippage;
        }
        sdk.oracle_public_key = self.oracle_public_key.clone();
        sdk
    }

    /// Read the oracle secret from the configured environment variable
    pub fn load_oracle_key(&self) -> KeeperResult<OracleKey> {
        let secret = std::env::var(&self.oracle_key_env)
            .map(Zeroizing::new)
            .map_err(|e| KeeperError::MissingOracleKey(format!("{}: {}", self.oracle_key_env, e)))?;
        Ok(OracleKey::from_hex(&secret)?)
    }
}

impl MarketConfig {
    /// Validate market configuration
    fn validate(&self) -> KeeperResult<()> {
        if self.name.is_empty() {
            return Err(KeeperError::invalid_parameter("market_name", "empty", "non-empty string"));
        }

        if self.market_id.is_empty() {
            return Err(KeeperError::invalid_parameter("market_id", "empty", "non-empty string"));
        }

        if self.yes_asset == self.no_asset {
            return Err(KeeperError::invalid_parameter(
                "no_asset",
                &self.no_asset.to_string(),
                "different from yes_asset",
            ));
        }

        if self.contract.is_collateral() {
            return Err(KeeperError::invalid_parameter("contract", "BTC", "an AMM contract location"));
        }

        Ok(())
    }
}

impl RetryConfig {
    /// Validate retry configuration
    fn validate(&self) -> KeeperResult<()> {
        if self.base_delay_ms == 0 {
            return Err(KeeperError::invalid_parameter("base_delay_ms", "0", "greater than 0"));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(KeeperError::invalid_parameter(
                "max_delay_ms",
                &self.max_delay_ms.to_string(),
                &format!("greater than or equal to base_delay_ms ({})", self.base_delay_ms),
            ));
        }

        if self.backoff_multiplier < 1.0 {
            return Err(KeeperError::invalid_parameter(
                "backoff_multiplier",
                &self.backoff_multiplier.to_string(),
                "at least 1.0",
            ));
        }

        Ok(())
    }

    /// Calculate delay for retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return self.base_delay_ms;
        }

        let exponential_delay =
            self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        (exponential_delay as u64).min(self.max_delay_ms)
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            network: "regtest".to_string(),
            oracle_key_env: default_oracle_key_env(),
            oracle_public_key: None,
            poll_interval_secs: 30,
            default_slippage_bps: DEFAULT_SLIPPAGE_BPS,
            confirmation: ConfirmationPolicy::default(),
            retry: RetryConfig::default(),
            markets: vec![],
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            name: "Default Market".to_string(),
            market_id: "market-1".to_string(),
            contract: Asset::ledger(1, 3),
            yes_asset: Asset::ledger(1, 1),
            no_asset: Asset::ledger(1, 2),
            priority: 1,
            enabled: true,
        }
    }
}

/// Create example configuration file
pub fn create_example_config(path: impl AsRef<Path>) -> KeeperResult<()> {
    let example_config = KeeperConfig {
        network: "testnet".to_string(),
        oracle_key_env: default_oracle_key_env(),
        oracle_public_key: None,
        poll_interval_secs: 30,
        default_slippage_bps: DEFAULT_SLIPPAGE_BPS,
        confirmation: ConfirmationPolicy::default(),
        retry: RetryConfig::default(),
        markets: vec![
            MarketConfig {
                name: "BTC above 100k by block 900000".to_string(),
                market_id: "btc-100k-900000".to_string(),
                contract: Asset::ledger(880_005, 1),
                yes_asset: Asset::ledger(880_001, 1),
                no_asset: Asset::ledger(880_002, 1),
                priority: 10,
                enabled: true,
            },
            MarketConfig {
                name: "Halving before block 1050000".to_string(),
                market_id: "halving-1050000".to_string(),
                contract: Asset::ledger(880_015, 1),
                yes_asset: Asset::ledger(880_011, 1),
                no_asset: Asset::ledger(880_012, 1),
                priority: 5,
                enabled: false,
            },
        ],
    };

    example_config.save(path)?;
    Ok(())
}

// Assets are written in their text form ("880001:1") in config files.
mod asset_text {
    use super::*;
    use serde::{Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(asset: &Asset, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&asset.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Asset, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Asset::from_str(&s).map_err(serde::de::Error::custom)
    }
}
