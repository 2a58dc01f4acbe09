/// Oracle commitments: build, sign and verify resolution messages
///
/// A resolution is the SHA-256 digest of [`OracleMessage::canonical_bytes`]
/// signed with BIP340 Schnorr over secp256k1. Signing uses no auxiliary
/// randomness (equivalent to 32 zero bytes of aux data), so the same key and
/// message always produce the same signature.

use std::fmt;
use std::str::FromStr;

use pm_types::{MarketError, MarketResult, OracleCommitment, OracleMessage, Outcome};
use secp256k1::{schnorr, All, Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Secret key length in bytes
pub const SECRET_KEY_LEN: usize = 32;

// ============================================================================
// Oracle Key
// ============================================================================

/// The oracle's signing key. Secret material is wiped when the key drops and
/// is never printed.
pub struct OracleKey {
    secp: Secp256k1<All>,
    keypair: Keypair,
}

impl OracleKey {
    /// Load a key from 32 raw secret bytes
    pub fn from_bytes(bytes: &[u8]) -> MarketResult<Self> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(MarketError::invalid_key(format!(
                "expected {} secret key bytes, got {}",
                SECRET_KEY_LEN,
                bytes.len()
            )));
        }
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, bytes).map_err(MarketError::invalid_key)?;
        Ok(Self { secp, keypair })
    }

    /// Load a key from 64 hex characters
    pub fn from_hex(hex: &str) -> MarketResult<Self> {
        let hex = Zeroizing::new(hex.trim().to_string());
        let mut secret = SecretKey::from_str(&hex).map_err(MarketError::invalid_key)?;
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &secret);
        secret.non_secure_erase();
        Ok(Self { secp, keypair })
    }

    /// X-only public key commitments are verified against
    pub fn public_key(&self) -> XOnlyPublicKey {
        self.keypair.x_only_public_key().0
    }

    /// Sign a resolution message
    pub fn sign(&self, message: &OracleMessage) -> OracleCommitment {
        let digest = Message::from_digest(message_digest(message));
        let signature = self.secp.sign_schnorr_no_aux_rand(&digest, &self.keypair);

        let mut bytes = [0u8; pm_types::SIGNATURE_LEN];
        bytes.copy_from_slice(&signature[..]);
        OracleCommitment {
            signature: bytes,
            message: message.clone(),
        }
    }
}

impl Drop for OracleKey {
    fn drop(&mut self) {
        self.keypair.non_secure_erase();
    }
}

impl fmt::Debug for OracleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleKey")
            .field("public_key", &self.public_key().to_string())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Build the resolution message for a market
pub fn build_message(market_id: &str, outcome: Outcome, block_height: u64) -> OracleMessage {
    OracleMessage::new(market_id, outcome, block_height)
}

/// SHA-256 of the canonical message bytes
pub fn message_digest(message: &OracleMessage) -> [u8; 32] {
    Sha256::digest(message.canonical_bytes()).into()
}

/// Sign with a raw secret key. The key is only held for the duration of the
/// call and is wiped before returning.
pub fn sign(message: &OracleMessage, secret_key: &[u8]) -> MarketResult<OracleCommitment> {
    let secret = Zeroizing::new(secret_key.to_vec());
    let key = OracleKey::from_bytes(&secret)?;
    Ok(key.sign(message))
}

/// Check a commitment against the oracle's public key. Any malformed or
/// mismatched signature yields `false`.
pub fn verify(commitment: &OracleCommitment, public_key: &XOnlyPublicKey) -> bool {
    let signature = match schnorr::Signature::from_slice(&commitment.signature) {
        Ok(signature) => signature,
        Err(_) => return false,
    };
    let digest = Message::from_digest(message_digest(&commitment.message));
    Secp256k1::verification_only()
        .verify_schnorr(&signature, &digest, public_key)
        .is_ok()
}

/// Verify a commitment for a specific market. A valid signature over another
/// market's message is rejected.
pub fn verify_for_market(
    commitment: &OracleCommitment,
    market_id: &str,
    public_key: &XOnlyPublicKey,
) -> MarketResult<()> {
    if commitment.message.market_id != market_id || !verify(commitment, public_key) {
        return Err(MarketError::InvalidOracleSignature {
            market_id: market_id.to_string(),
        });
    }
    Ok(())
}

/// Parse a hex x-only public key
pub fn parse_public_key(hex: &str) -> MarketResult<XOnlyPublicKey> {
    XOnlyPublicKey::from_str(hex.trim()).map_err(MarketError::invalid_key)
}
