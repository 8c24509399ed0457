//! secp256k1 wallet signature recovery.
//!
//! Login proofs arrive as 65-byte `r || s || v` signatures over the EIP-191
//! envelope of the challenge message. Verification recovers the signing key
//! and derives its address; there is no stored public key to compare
//! against, only the claimed wallet address.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use sienna_types::WalletAddress;

use crate::hash::{eip191_hash, keccak256};
use crate::{CryptoError, Result};

/// A parsed 65-byte recoverable signature.
#[derive(Clone, Debug)]
pub struct WalletSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl WalletSignature {
    /// Parse from `0x`-prefixed (or bare) hex of exactly 65 bytes.
    pub fn parse(signature_hex: &str) -> Result<Self> {
        let raw = signature_hex
            .strip_prefix("0x")
            .unwrap_or(signature_hex);
        let bytes =
            hex::decode(raw).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        if bytes.len() != 65 {
            return Err(CryptoError::InvalidSignature(format!(
                "expected 65 bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v: bytes[64] })
    }
}

/// Parse the recovery id from a v value. Wallets emit 27/28, raw recovery
/// ids are 0/1; both are accepted.
fn parse_recovery_id(v: u8) -> Result<RecoveryId> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => {
            return Err(CryptoError::InvalidSignature(format!(
                "recovery id {v} out of range"
            )))
        }
    };
    RecoveryId::try_from(id)
        .map_err(|_| CryptoError::InvalidSignature(format!("recovery id {v} out of range")))
}

/// Recover the signer's wallet address from a prehashed message.
pub fn recover_signer(
    message_hash: &[u8; 32],
    signature: &WalletSignature,
) -> Result<WalletAddress> {
    let recovery_id = parse_recovery_id(signature.v)?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(&signature.r);
    sig_bytes[32..].copy_from_slice(&signature.s);
    let sig = Signature::from_slice(&sig_bytes)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

    let recovered = VerifyingKey::recover_from_prehash(message_hash, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_from_pubkey(&recovered))
}

/// Derive the wallet address for a public key:
/// last 20 bytes of `keccak256(uncompressed_pubkey[1..])`.
pub fn address_from_pubkey(public_key: &VerifyingKey) -> WalletAddress {
    let point = public_key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    WalletAddress::from_bytes(&address)
}

/// Check a `personal_sign` proof: true iff the signature over the EIP-191
/// envelope of `message` recovers to `expected`.
///
/// A signature that parses but recovers to nothing (or to a different key)
/// is an ordinary `false`; only malformed input is an error.
pub fn verify_personal_signature(
    message: &str,
    signature_hex: &str,
    expected: &WalletAddress,
) -> Result<bool> {
    let signature = WalletSignature::parse(signature_hex)?;
    let hash = eip191_hash(message);
    match recover_signer(&hash, &signature) {
        Ok(recovered) => Ok(recovered == *expected),
        Err(CryptoError::RecoveryFailed) => Ok(false),
        Err(e) => Err(e),
    }
}
