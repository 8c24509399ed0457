//! Session tokens: HMAC-SHA256 over base64url JSON claims.
//!
//! Format: `base64url(claims_json) . base64url(hmac_sha256(secret, body))`.
//! Verification is MAC-first; claims are only parsed from an authenticated
//! body.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{nonce, CryptoError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Which half of a token pair a token is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by every token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Identity row id.
    pub sub: i64,
    /// The identifier used to authenticate: wallet address or email.
    pub ident: String,
    pub kind: TokenKind,
    pub iat: u64,
    pub exp: u64,
    /// Random id so tokens minted in the same second still differ.
    pub jti: String,
}

impl TokenClaims {
    pub fn new(sub: i64, ident: &str, kind: TokenKind, now: u64, ttl_secs: u64) -> Self {
        Self {
            sub,
            ident: ident.to_string(),
            kind,
            iat: now,
            exp: now + ttl_secs,
            jti: nonce::random_hex(8),
        }
    }
}

/// Mints and verifies session tokens with a fixed 32-byte secret.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TokenSigner {
    secret: [u8; 32],
}

impl TokenSigner {
    pub fn new(secret: [u8; 32]) -> Self {
        Self { secret }
    }

    /// Parse a 64-hex-char secret (as stored in the daemon config).
    pub fn from_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&bytes);
        Ok(Self { secret })
    }

    /// Fresh random secret. Tokens die with the process unless the secret
    /// is persisted.
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut secret);
        Self { secret }
    }

    pub fn mint(&self, claims: &TokenClaims) -> Result<String> {
        let payload =
            serde_json::to_vec(claims).map_err(|e| CryptoError::Serialization(e.to_string()))?;
        let body = URL_SAFE_NO_PAD.encode(payload);
        let tag = self.mac_of(body.as_bytes())?;
        Ok(format!("{body}.{}", URL_SAFE_NO_PAD.encode(tag)))
    }

    /// Verify MAC and expiry, returning the claims.
    pub fn verify(&self, token: &str, now: u64) -> Result<TokenClaims> {
        let (body, tag) = token.split_once('.').ok_or(CryptoError::TokenInvalid)?;
        let tag_bytes = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| CryptoError::TokenInvalid)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        mac.update(body.as_bytes());
        mac.verify_slice(&tag_bytes)
            .map_err(|_| CryptoError::TokenInvalid)?;

        let payload = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| CryptoError::TokenInvalid)?;
        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| CryptoError::TokenInvalid)?;

        if claims.exp < now {
            return Err(CryptoError::TokenExpired);
        }
        Ok(claims)
    }

    fn mac_of(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new([7u8; 32])
    }

    #[test]
    fn test_mint_verify_round_trip() {
        let s = signer();
        let claims = TokenClaims::new(42, "0xabc", TokenKind::Access, 1_000, 900);
        let token = s.mint(&claims).expect("mint");
        let back = s.verify(&token, 1_100).expect("verify");
        assert_eq!(back, claims);
        assert_eq!(back.sub, 42);
        assert_eq!(back.kind, TokenKind::Access);
    }

    #[test]
    fn test_expired_token_rejected() {
        let s = signer();
        let claims = TokenClaims::new(1, "a@b", TokenKind::Refresh, 1_000, 100);
        let token = s.mint(&claims).expect("mint");
        // Expiry second itself is still valid.
        assert!(s.verify(&token, 1_100).is_ok());
        assert!(matches!(
            s.verify(&token, 1_101),
            Err(CryptoError::TokenExpired)
        ));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let s = signer();
        let claims = TokenClaims::new(1, "x", TokenKind::Access, 1_000, 900);
        let token = s.mint(&claims).expect("mint");
        let (body, tag) = token.split_once('.').expect("format");
        // Forge a different subject with the old tag.
        let forged_claims = TokenClaims { sub: 2, ..claims };
        let forged_body =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).expect("json"));
        assert_ne!(forged_body, body);
        let forged = format!("{forged_body}.{tag}");
        assert!(matches!(
            s.verify(&forged, 1_001),
            Err(CryptoError::TokenInvalid)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let s1 = signer();
        let s2 = TokenSigner::new([8u8; 32]);
        let token = s1
            .mint(&TokenClaims::new(1, "x", TokenKind::Access, 1_000, 900))
            .expect("mint");
        assert!(matches!(
            s2.verify(&token, 1_001),
            Err(CryptoError::TokenInvalid)
        ));
    }

    #[test]
    fn test_garbage_tokens_rejected() {
        let s = signer();
        for garbage in ["", "no-dot-here", "a.b", "!!!.???"] {
            assert!(s.verify(garbage, 0).is_err(), "accepted: {garbage}");
        }
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let s = signer();
        let a = s
            .mint(&TokenClaims::new(1, "x", TokenKind::Access, 1_000, 900))
            .expect("mint");
        let b = s
            .mint(&TokenClaims::new(1, "x", TokenKind::Access, 1_000, 900))
            .expect("mint");
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_hex_validates_length() {
        assert!(TokenSigner::from_hex(&"ab".repeat(32)).is_ok());
        assert!(TokenSigner::from_hex("abcd").is_err());
        assert!(TokenSigner::from_hex("zz").is_err());
    }
}
