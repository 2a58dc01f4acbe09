/// Oracle resolution message and signed commitment

use serde::{Deserialize, Serialize};

use crate::market::Outcome;

/// Size of a BIP340 Schnorr signature
pub const SIGNATURE_LEN: usize = 64;

/// Statement that a market resolved to `outcome` as of a block height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleMessage {
    /// Market identifier
    #[serde(rename = "asset_id")]
    pub market_id: String,
    /// Winning side
    pub outcome: Outcome,
    /// Height at which the outcome was observed
    #[serde(rename = "block_height")]
    pub resolution_block_height: u64,
}

impl OracleMessage {
    pub fn new(market_id: impl Into<String>, outcome: Outcome, resolution_block_height: u64) -> Self {
        Self {
            market_id: market_id.into(),
            outcome,
            resolution_block_height,
        }
    }

    /// Canonical byte encoding that gets hashed and signed.
    ///
    /// Compact JSON with a fixed field order:
    /// `{"asset_id":<string>,"outcome":"YES"|"NO","block_height":<u64>}`.
    /// The identifier is a JSON string literal (quote, backslash and control
    /// characters escaped, everything else verbatim UTF-8); the height is
    /// base-10 with no leading zeros. The ledger verifies this exact form,
    /// so it must not depend on a serializer's field ordering.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = String::with_capacity(64 + self.market_id.len());
        out.push_str("{\"asset_id\":");
        push_json_string(&mut out, &self.market_id);
        out.push_str(",\"outcome\":\"");
        out.push_str(self.outcome.as_str());
        out.push_str("\",\"block_height\":");
        out.push_str(&self.resolution_block_height.to_string());
        out.push('}');
        out.into_bytes()
    }
}

fn push_json_string(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// A resolution message together with the oracle's signature over it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleCommitment {
    #[serde(with = "signature_bytes")]
    pub signature: [u8; SIGNATURE_LEN],
    pub message: OracleMessage,
}

// Signatures travel as a plain array of byte values.
mod signature_bytes {
    use super::SIGNATURE_LEN;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; SIGNATURE_LEN], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(bytes.iter())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; SIGNATURE_LEN], D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        let len = bytes.len();
        <[u8; SIGNATURE_LEN]>::try_from(bytes).map_err(|_| {
            serde::de::Error::invalid_length(len, &"64 signature bytes")
        })
    }
}
