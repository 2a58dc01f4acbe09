//! Error types for the keeper service

use pm_sdk::SdkError;
use pm_types::MarketError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    #[error("Oracle key unavailable: {0}")]
    MissingOracleKey(String),

    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl KeeperError {
    pub fn invalid_parameter(name: &str, value: &str, expected: &str) -> Self {
        KeeperError::InvalidConfig(format!("{} = {} (expected {})", name, value, expected))
    }
}

impl From<MarketError> for KeeperError {
    fn from(err: MarketError) -> Self {
        KeeperError::Sdk(SdkError::Market(err))
    }
}

impl From<std::io::Error> for KeeperError {
    fn from(err: std::io::Error) -> Self {
        KeeperError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for KeeperError {
    fn from(err: serde_json::Error) -> Self {
        KeeperError::SerializationError(err.to_string())
    }
}

pub type KeeperResult<T> = std::result::Result<T, KeeperError>;
