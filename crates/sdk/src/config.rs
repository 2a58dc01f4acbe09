use std::time::Duration;

use pm_math::SlippageTolerance;
use pm_types::{
    DEFAULT_LIQUIDITY_OUTPUT_INDEX, DEFAULT_MAX_POLL_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SLIPPAGE_BPS, DEFAULT_SWAP_OUTPUT_INDEX,
};
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};

use crate::errors::{SdkError, SdkResult};
use crate::oracle::parse_public_key;

/// How long to wait for confirmations, and how often to ask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    /// First delay between polls
    pub poll_interval_ms: u64,
    /// Cap on the delay between polls
    pub max_poll_interval_ms: u64,
    /// Multiplier applied per unconfirmed poll; 1 polls at a fixed rate
    pub backoff_multiplier: u32,
    /// Give up after this long; `None` waits until cancelled
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_poll_interval_ms: DEFAULT_MAX_POLL_INTERVAL_MS,
            backoff_multiplier: 1,
            timeout_ms: Some(10 * 60 * 1000),
        }
    }
}

impl ConfirmationPolicy {
    /// Delay before poll number `attempt + 1`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.backoff_multiplier.max(1)).saturating_pow(attempt);
        let delay = self
            .poll_interval_ms
            .saturating_mul(factor)
            .min(self.max_poll_interval_ms.max(self.poll_interval_ms));
        Duration::from_millis(delay)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> SdkResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(SdkError::InvalidConfig(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_poll_interval_ms < self.poll_interval_ms {
            return Err(SdkError::InvalidConfig(
                "max_poll_interval_ms must be at least poll_interval_ms".to_string(),
            ));
        }
        if self.timeout_ms == Some(0) {
            return Err(SdkError::InvalidConfig(
                "timeout_ms must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// SDK configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Network name passed through to the ledger client ("regtest", "testnet", ...)
    pub network: String,
    /// Output receiving swap and collateral-deposit results
    pub destination_output_index: u32,
    /// Output receiving change from liquidity deposits
    pub liquidity_output_index: u32,
    /// Slippage applied when callers do not pass one
    pub default_slippage: SlippageTolerance,
    pub confirmation: ConfirmationPolicy,
    /// Hex x-only public key resolutions are verified against
    #[serde(default)]
    pub oracle_public_key: Option<String>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            network: "regtest".to_string(),
            destination_output_index: DEFAULT_SWAP_OUTPUT_INDEX,
            liquidity_output_index: DEFAULT_LIQUIDITY_OUTPUT_INDEX,
            default_slippage: SlippageTolerance::from_bps(DEFAULT_SLIPPAGE_BPS)
                .unwrap_or(SlippageTolerance::ZERO),
            confirmation: ConfirmationPolicy::default(),
            oracle_public_key: None,
        }
    }
}

impl SdkConfig {
    /// Default configuration for a network
    pub fn for_network(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            ..Self::default()
        }
    }

    pub fn with_oracle_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.oracle_public_key = Some(public_key.into());
        self
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Parsed oracle key, if configured
    pub fn oracle_key(&self) -> SdkResult<Option<XOnlyPublicKey>> {
        self.oracle_public_key
            .as_deref()
            .map(parse_public_key)
            .transpose()
            .map_err(SdkError::from)
    }

    pub fn validate(&self) -> SdkResult<()> {
        if self.network.trim().is_empty() {
            return Err(SdkError::InvalidConfig("network cannot be empty".to_string()));
        }
        if self.destination_output_index == self.liquidity_output_index {
            return Err(SdkError::InvalidConfig(
                "destination_output_index and liquidity_output_index must differ".to_string(),
            ));
        }
        self.confirmation.validate()?;
        self.oracle_key()?;
        Ok(())
    }
}
