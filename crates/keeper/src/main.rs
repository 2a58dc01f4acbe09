use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use num_bigint::BigUint;
use pm_math::{price_impact_bps, quote_swap, ReservePool, SlippageTolerance};
use pm_sdk::{build_message, parse_public_key, verify, OracleKey};
use pm_types::{Asset, OracleCommitment, Outcome, TransactionDescriptor};
use tracing_subscriber::prelude::*;

use pm_keeper::{create_example_config, KeeperConfig};

#[derive(Parser, Debug)]
#[command(name = "pm-keeper")]
#[command(about = "Prediction market oracle keeper")]
struct Args {
    /// Path to keeper configuration file
    #[arg(short, long, default_value = "keeper.toml", global = true)]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an example configuration file
    ExampleConfig,

    /// Load and validate the configuration file
    CheckConfig,

    /// Quote a swap against the given reserves
    Quote {
        /// Reserve of the input asset
        #[arg(long)]
        input_reserve: String,
        /// Reserve of the output asset
        #[arg(long)]
        output_reserve: String,
        /// Amount of the input asset to sell
        #[arg(long)]
        amount: String,
        /// Slippage tolerance in basis points
        #[arg(long)]
        slippage_bps: Option<u64>,
    },

    /// Sign an outcome with the oracle key and print the commitment
    Sign {
        #[arg(long)]
        market_id: String,
        #[arg(long)]
        outcome: String,
        #[arg(long)]
        block_height: u64,
    },

    /// Verify a commitment (JSON) against an oracle public key
    Verify {
        /// File holding the commitment JSON
        #[arg(long)]
        commitment: PathBuf,
        /// Hex x-only public key; defaults to the configured one
        #[arg(long)]
        public_key: Option<String>,
    },

    /// Build the signed resolution call for a configured market without
    /// broadcasting it
    Resolve {
        #[arg(long)]
        market_id: String,
        #[arg(long)]
        outcome: String,
        #[arg(long)]
        block_height: u64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::ExampleConfig => {
            create_example_config(&args.config)?;
            tracing::info!(path = %args.config.display(), "wrote example configuration");
        }
        Command::CheckConfig => {
            let config = KeeperConfig::load(&args.config)?;
            let enabled = config.get_enabled_markets();
            tracing::info!(
                network = %config.network,
                markets = config.markets.len(),
                enabled = enabled.len(),
                "configuration is valid"
            );
            for market in enabled {
                println!("{} ({}) contract {}", market.market_id, market.name, market.contract);
            }
        }
        Command::Quote {
            input_reserve,
            output_reserve,
            amount,
            slippage_bps,
        } => {
            // Reserve pairs from the command line have no real identities
            let input = Asset::ledger(0, 1);
            let output = Asset::ledger(0, 2);
            let pool = ReservePool::new(
                input,
                parse_amount("input_reserve", &input_reserve)?,
                output,
                parse_amount("output_reserve", &output_reserve)?,
            )?;
            let tolerance = match slippage_bps {
                Some(bps) => SlippageTolerance::from_bps(bps)?,
                None => KeeperConfig::default().sdk_config().default_slippage,
            };
            let quote = quote_swap(&pool, &input, &parse_amount("amount", &amount)?)?
                .with_slippage(tolerance);
            println!("output:      {}", quote.output_amount);
            println!("min output:  {}", quote.min_output_amount);
            println!("impact bps:  {}", price_impact_bps(&quote));
        }
        Command::Sign {
            market_id,
            outcome,
            block_height,
        } => {
            let config = load_or_default(&args.config)?;
            let key = config.load_oracle_key()?;
            let outcome = Outcome::from_str(&outcome)?;
            let commitment = key.sign(&build_message(&market_id, outcome, block_height));
            tracing::info!(public_key = %key.public_key(), %market_id, "signed outcome");
            println!("{}", serde_json::to_string_pretty(&commitment)?);
        }
        Command::Verify {
            commitment,
            public_key,
        } => {
            let text = std::fs::read_to_string(&commitment)
                .with_context(|| format!("reading {}", commitment.display()))?;
            let commitment: OracleCommitment = serde_json::from_str(&text)?;
            let public_key = match public_key {
                Some(hex) => hex,
                None => KeeperConfig::load(&args.config)?
                    .oracle_public_key
                    .ok_or_else(|| anyhow!("no --public-key given and none configured"))?,
            };
            if !verify(&commitment, &parse_public_key(&public_key)?) {
                bail!("signature does not verify for market {}", commitment.message.market_id);
            }
            println!(
                "valid: {} resolved {} at block {}",
                commitment.message.market_id,
                commitment.message.outcome,
                commitment.message.resolution_block_height
            );
        }
        Command::Resolve {
            market_id,
            outcome,
            block_height,
        } => {
            let config = KeeperConfig::load(&args.config)?;
            let market = config
                .get_enabled_markets()
                .into_iter()
                .find(|m| m.market_id == market_id)
                .ok_or_else(|| anyhow!("market {} is not configured or not enabled", market_id))?;
            let key = config.load_oracle_key()?;
            check_public_key(&config, &key)?;

            let outcome = Outcome::from_str(&outcome)?;
            let commitment = key.sign(&build_message(&market.market_id, outcome, block_height));
            let descriptor = TransactionDescriptor::resolve(market.contract, commitment);
            tracing::warn!(%market_id, "DRY RUN: resolution call built but not broadcast");
            println!("{}", serde_json::to_string_pretty(&descriptor.to_ledger_message())?);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pm_keeper={},pm_sdk={}", level, level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn parse_amount(name: &str, value: &str) -> Result<BigUint> {
    BigUint::from_str(value).map_err(|e| anyhow!("invalid {} '{}': {}", name, value, e))
}

fn load_or_default(path: &Path) -> Result<KeeperConfig> {
    if path.exists() {
        Ok(KeeperConfig::load(path)?)
    } else {
        Ok(KeeperConfig::default())
    }
}

fn check_public_key(config: &KeeperConfig, key: &OracleKey) -> Result<()> {
    if let Some(expected) = &config.oracle_public_key {
        if parse_public_key(expected)? != key.public_key() {
            bail!("oracle key does not match configured oracle_public_key {}", expected);
        }
    }
    Ok(())
}
