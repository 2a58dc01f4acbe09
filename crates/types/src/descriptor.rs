/// Abstract transaction descriptors handed to the ledger client.
///
/// Descriptors carry no signing or fee information. The ledger client turns
/// them into a message output, attaches fee inputs and broadcasts.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::amount::{decimal, decimal_opt};
use crate::asset::Asset;
use crate::constants::*;
use crate::oracle::OracleCommitment;

// ============================================================================
// Contract Calls
// ============================================================================

/// Kind of contract call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Mint,
    Swap,
    Resolve,
}

/// Moves `amount` of `asset` to a transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub asset: Asset,
    pub destination_output_index: u32,
    #[serde(with = "decimal")]
    pub amount: BigUint,
}

/// A contract call against an AMM or asset contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDescriptor {
    /// Contract being called
    pub contract: Asset,
    pub call_kind: CallKind,
    /// Output that receives the call's result
    pub pointer: u32,
    /// Minimum output the ledger must enforce for swaps
    #[serde(with = "decimal_opt", default, skip_serializing_if = "Option::is_none")]
    pub asserted_min_output: Option<BigUint>,
    #[serde(default)]
    pub transfers: Vec<Transfer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle_commitment: Option<OracleCommitment>,
}

impl TransactionDescriptor {
    /// Plain mint call with no transfers
    pub fn mint(contract: Asset) -> Self {
        Self {
            contract,
            call_kind: CallKind::Mint,
            pointer: DEFAULT_POINTER,
            asserted_min_output: None,
            transfers: Vec::new(),
            oracle_commitment: None,
        }
    }

    /// Resolution call carrying a signed oracle commitment
    pub fn resolve(contract: Asset, commitment: OracleCommitment) -> Self {
        Self {
            contract,
            call_kind: CallKind::Resolve,
            pointer: DEFAULT_POINTER,
            asserted_min_output: None,
            transfers: Vec::new(),
            oracle_commitment: Some(commitment),
        }
    }

    pub fn with_transfer(mut self, transfer: Transfer) -> Self {
        self.transfers.push(transfer);
        self
    }

    /// Render the ledger's JSON message for this call
    pub fn to_ledger_message(&self) -> Value {
        let mut call = Map::new();
        call.insert("pointer".to_string(), json!(self.pointer));
        match self.call_kind {
            CallKind::Mint => {}
            CallKind::Swap => {
                if let Some(min_out) = &self.asserted_min_output {
                    call.insert(
                        "assert_values".to_string(),
                        json!({ "min_out_value": min_out.to_str_radix(10) }),
                    );
                }
            }
            CallKind::Resolve => {
                if let Some(commitment) = &self.oracle_commitment {
                    call.insert("oracle_message".to_string(), commitment_value(commitment));
                }
            }
        }

        let call_type = match self.call_kind {
            CallKind::Mint => "mint",
            CallKind::Swap => "swap",
            CallKind::Resolve => "resolve",
        };

        let mut call_types = Map::new();
        call_types.insert(call_type.to_string(), Value::Object(call));

        let mut message = json!({
            "contract_call": {
                "contract": self.contract,
                "call_type": Value::Object(call_types),
            }
        });

        if !self.transfers.is_empty() {
            let transfers: Vec<Value> = self
                .transfers
                .iter()
                .map(|t| {
                    json!({
                        "asset": t.asset,
                        "output": t.destination_output_index,
                        "amount": t.amount.to_str_radix(10),
                    })
                })
                .collect();
            message["transfer"] = json!({ "transfers": transfers });
        }

        message
    }
}

// ============================================================================
// Contract Creation
// ============================================================================

/// Contract-creation messages for outcome assets and the market AMM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractCreation {
    /// Freely mintable outcome asset (one per side)
    OutcomeAsset {
        ticker: String,
        divisibility: u8,
        live_time: u64,
        #[serde(with = "decimal")]
        amount_per_mint: BigUint,
    },
    /// Constant-product AMM collateralized by two input assets
    Amm {
        ticker: String,
        divisibility: u8,
        live_time: u64,
        input_assets: [Asset; 2],
    },
}

impl ContractCreation {
    pub fn outcome_asset(ticker: impl Into<String>) -> Self {
        Self::OutcomeAsset {
            ticker: ticker.into(),
            divisibility: OUTCOME_DIVISIBILITY,
            live_time: DEFAULT_LIVE_TIME,
            amount_per_mint: BigUint::from(OUTCOME_AMOUNT_PER_MINT),
        }
    }

    pub fn amm(ticker: impl Into<String>, first: Asset, second: Asset) -> Self {
        Self::Amm {
            ticker: ticker.into(),
            divisibility: OUTCOME_DIVISIBILITY,
            live_time: DEFAULT_LIVE_TIME,
            input_assets: [first, second],
        }
    }

    pub fn ticker(&self) -> &str {
        match self {
            Self::OutcomeAsset { ticker, .. } | Self::Amm { ticker, .. } => ticker,
        }
    }

    /// Render the ledger's JSON message for this creation
    pub fn to_ledger_message(&self) -> Value {
        let contract_type = match self {
            Self::OutcomeAsset {
                ticker,
                divisibility,
                live_time,
                amount_per_mint,
            } => json!({
                "moa": {
                    "ticker": ticker,
                    "divisibility": divisibility,
                    "live_time": live_time,
                    "mint_mechanism": {
                        "free_mint": { "amount_per_mint": amount_per_mint.to_str_radix(10) }
                    }
                }
            }),
            Self::Amm {
                ticker,
                divisibility,
                live_time,
                input_assets,
            } => json!({
                "mba": {
                    "ticker": ticker,
                    "divisibility": divisibility,
                    "live_time": live_time,
                    "mint_mechanism": {
                        "collateralized": {
                            "input_assets": input_assets
                                .iter()
                                .map(asset_input)
                                .collect::<Vec<_>>(),
                            "_mutable_assets": false,
                            "mint_structure": {
                                "proportional": { "ratio_model": CONSTANT_PRODUCT_RATIO_MODEL }
                            }
                        }
                    },
                    "burn_mechanism": {},
                    "swap_mechanism": {}
                }
            }),
        };
        json!({ "contract_creation": { "contract_type": contract_type } })
    }
}

// Same shape as the commitment's serde form: signature as a byte array.
fn commitment_value(commitment: &OracleCommitment) -> Value {
    let message = &commitment.message;
    json!({
        "signature": commitment.signature.to_vec(),
        "message": {
            "asset_id": message.market_id,
            "outcome": message.outcome.as_str(),
            "block_height": message.resolution_block_height,
        },
    })
}

fn asset_input(asset: &Asset) -> Value {
    match asset {
        Asset::Ledger { .. } => json!({ "glittr_asset": asset }),
        Asset::Collateral => json!("raw_btc"),
    }
}
