//! Creator profile query functions.
//!
//! `total_earnings` and `subscriber_count` are derived aggregates; only the
//! ledger and lifecycle code paths call the adjustment functions here, and
//! the profile-update path never touches them.

use rusqlite::{Connection, OptionalExtension};

use sienna_types::creator::CreatorProfile;
use sienna_types::{Amount, IdentityId, WalletAddress};

use crate::{DbError, Result};

const COLUMNS: &str = "wallet_address, identity_id, display_name, subscription_price, \
     total_earnings, subscriber_count, verified, contract_address, registered_at";

/// Insert a profile stub for a wallet that has not been seen on-chain yet.
///
/// `contract_address` stays NULL until a registration event fills it. A
/// duplicate wallet or display name surfaces as [`DbError::Constraint`].
pub fn insert_stub(
    conn: &Connection,
    wallet: &WalletAddress,
    identity_id: IdentityId,
    display_name: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO creator_profiles (wallet_address, identity_id, display_name)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![wallet.as_str(), identity_id, display_name],
    )
    .map_err(DbError::classify)?;
    Ok(())
}

/// Insert a profile from an on-chain registration event.
pub fn insert_registered(
    conn: &Connection,
    wallet: &WalletAddress,
    identity_id: IdentityId,
    display_name: &str,
    contract: &WalletAddress,
    registered_at: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO creator_profiles
             (wallet_address, identity_id, display_name, contract_address, registered_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            wallet.as_str(),
            identity_id,
            display_name,
            contract.as_str(),
            registered_at as i64
        ],
    )
    .map_err(DbError::classify)?;
    Ok(())
}

/// Overwrite the on-chain fields of an existing profile. Used when a
/// registration event is redelivered, or arrives for a stubbed profile.
///
/// Returns the number of rows updated (0 if the wallet is unknown). A
/// display-name collision surfaces as [`DbError::Constraint`].
pub fn update_registration(
    conn: &Connection,
    wallet: &WalletAddress,
    display_name: &str,
    contract: &WalletAddress,
    registered_at: u64,
) -> Result<usize> {
    conn.execute(
        "UPDATE creator_profiles
         SET display_name = ?2, contract_address = ?3, registered_at = ?4
         WHERE wallet_address = ?1",
        rusqlite::params![
            wallet.as_str(),
            display_name,
            contract.as_str(),
            registered_at as i64
        ],
    )
    .map_err(DbError::classify)
}

/// Look a profile up by canonical wallet address.
pub fn get(conn: &Connection, wallet: &WalletAddress) -> Result<Option<CreatorProfile>> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM creator_profiles WHERE wallet_address = ?1"),
            [wallet.as_str()],
            raw_from_row,
        )
        .optional()?;
    raw.map(into_profile).transpose()
}

/// Mark a creator verified. Returns the number of rows updated; 0 means the
/// wallet has no profile (an orphan verification event).
pub fn set_verified(conn: &Connection, wallet: &WalletAddress) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE creator_profiles SET verified = 1 WHERE wallet_address = ?1",
        [wallet.as_str()],
    )?)
}

/// Adjust cumulative earnings by a signed delta. Callers run this inside the
/// same transaction as the payment status transition it accounts for.
pub fn adjust_earnings(conn: &Connection, wallet: &WalletAddress, delta: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE creator_profiles SET total_earnings = total_earnings + ?2
         WHERE wallet_address = ?1",
        rusqlite::params![wallet.as_str(), delta],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("creator {wallet}")));
    }
    Ok(())
}

/// Adjust the subscriber counter by a signed delta.
pub fn adjust_subscriber_count(
    conn: &Connection,
    wallet: &WalletAddress,
    delta: i64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE creator_profiles SET subscriber_count = subscriber_count + ?2
         WHERE wallet_address = ?1",
        rusqlite::params![wallet.as_str(), delta],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("creator {wallet}")));
    }
    Ok(())
}

/// Owner-editable profile metadata. Aggregates and on-chain fields are not
/// reachable from here.
pub fn update_profile(
    conn: &Connection,
    wallet: &WalletAddress,
    display_name: Option<&str>,
    subscription_price: Option<Amount>,
) -> Result<usize> {
    conn.execute(
        "UPDATE creator_profiles
         SET display_name = COALESCE(?2, display_name),
             subscription_price = COALESCE(?3, subscription_price)
         WHERE wallet_address = ?1",
        rusqlite::params![
            wallet.as_str(),
            display_name,
            subscription_price.map(|p| p as i64)
        ],
    )
    .map_err(DbError::classify)
}

struct RawProfile {
    wallet_address: String,
    identity_id: i64,
    display_name: String,
    subscription_price: i64,
    total_earnings: i64,
    subscriber_count: i64,
    verified: i64,
    contract_address: Option<String>,
    registered_at: Option<i64>,
}

fn raw_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawProfile> {
    Ok(RawProfile {
        wallet_address: row.get(0)?,
        identity_id: row.get(1)?,
        display_name: row.get(2)?,
        subscription_price: row.get(3)?,
        total_earnings: row.get(4)?,
        subscriber_count: row.get(5)?,
        verified: row.get(6)?,
        contract_address: row.get(7)?,
        registered_at: row.get(8)?,
    })
}

fn into_profile(raw: RawProfile) -> Result<CreatorProfile> {
    let wallet_address = WalletAddress::parse(&raw.wallet_address)
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    let contract_address = raw
        .contract_address
        .map(|s| WalletAddress::parse(&s))
        .transpose()
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    Ok(CreatorProfile {
        wallet_address,
        identity_id: raw.identity_id,
        display_name: raw.display_name,
        subscription_price: raw.subscription_price as u64,
        total_earnings: raw.total_earnings as u64,
        subscriber_count: raw.subscriber_count as u64,
        verified: raw.verified != 0,
        contract_address,
        registered_at: raw.registered_at.map(|t| t as u64),
    })
}
