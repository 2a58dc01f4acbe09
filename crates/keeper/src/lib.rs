pub mod config;
pub mod error;
pub mod keeper;

pub use config::{create_example_config, KeeperConfig, MarketConfig, RetryConfig};
pub use error::{KeeperError, KeeperResult};
pub use keeper::{HealthSummary, Keeper, ResolutionReport};
