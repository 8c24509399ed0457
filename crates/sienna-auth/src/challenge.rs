//! Wallet challenge-response login.
//!
//! A client asks for a nonce, signs `CHALLENGE_PREFIX + nonce` with the
//! wallet key (EIP-191 personal message), and presents the signature. The
//! signature is verified before the nonce is consumed, so a bad signature
//! never burns a live challenge; consumption itself is one conditional
//! update, so two logins racing on the same nonce cannot both win.

use rusqlite::Connection;
use tracing::debug;

use sienna_crypto::{nonce as nonce_gen, wallet, CryptoError};
use sienna_db::{queries, DbError};
use sienna_types::identity::{Identity, Role};
use sienna_types::{WalletAddress, CHALLENGE_PREFIX, NONCE_TTL_SECS};

use crate::{AuthError, Result};

/// An issued login challenge.
#[derive(Clone, Debug)]
pub struct Challenge {
    pub nonce: String,
    /// Exact text the wallet must sign.
    pub challenge_message: String,
    pub expires_in_ms: u64,
}

/// Issue a login nonce for a wallet, lazily creating the identity on first
/// sight.
///
/// A first-sight wallet requesting the creator role also gets a creator
/// profile stub; the on-chain registration event fills it in later. The
/// duplicate-profile case (stub already present) is swallowed.
pub fn issue_nonce(
    conn: &Connection,
    address_str: &str,
    intended_role: Role,
    now: u64,
) -> Result<Challenge> {
    let address = WalletAddress::parse(address_str)
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    let identity_id = match queries::identities::find_by_wallet(conn, &address)? {
        Some(identity) => identity.id,
        None => {
            let handle = nonce_gen::random_handle();
            let id = queries::identities::insert_wallet(conn, &address, &handle, intended_role, now)?;
            debug!(wallet = %address, handle, role = intended_role.as_str(), "created identity");
            if intended_role == Role::Creator {
                match queries::creators::insert_stub(conn, &address, id, &handle) {
                    Ok(()) | Err(DbError::Constraint(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            id
        }
    };

    let nonce = nonce_gen::random_nonce();
    queries::nonces::insert(conn, identity_id, &nonce, now, now + NONCE_TTL_SECS)?;

    Ok(Challenge {
        challenge_message: format!("{CHALLENGE_PREFIX}{nonce}"),
        nonce,
        expires_in_ms: NONCE_TTL_SECS * 1000,
    })
}

/// Verify a signed challenge and consume the nonce.
///
/// Outcomes an attacker can distinguish are deliberately coarse: unknown or
/// deactivated wallet is `UserNotFound`, any signature problem is
/// `BadSignature`, and a spent, expired, or never-issued nonce is
/// `InvalidNonce`.
pub fn verify_login(
    conn: &Connection,
    address_str: &str,
    nonce: &str,
    signature_hex: &str,
    now: u64,
) -> Result<Identity> {
    let address = WalletAddress::parse(address_str)
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    let identity = queries::identities::find_by_wallet(conn, &address)?
        .ok_or(AuthError::UserNotFound)?;
    if !identity.active {
        return Err(AuthError::UserNotFound);
    }

    let message = format!("{CHALLENGE_PREFIX}{nonce}");
    match wallet::verify_personal_signature(&message, signature_hex, &address) {
        Ok(true) => {}
        Ok(false) => return Err(AuthError::BadSignature),
        Err(CryptoError::InvalidSignature(_)) => return Err(AuthError::BadSignature),
        Err(e) => return Err(e.into()),
    }

    // Signature holds; only now does the nonce get spent.
    match queries::nonces::consume(conn, identity.id, nonce, now) {
        Ok(()) => Ok(identity),
        Err(DbError::NotFound(_)) => Err(AuthError::InvalidNonce),
        Err(e) => Err(e.into()),
    }
}
