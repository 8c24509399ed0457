//! Subscription query functions.
//!
//! The on-chain token id primary key is the idempotency key. Activation
//! state only moves through conditional updates; the lifecycle layer wraps
//! these in transactions together with the creator counter adjustments.

use rusqlite::{Connection, OptionalExtension};

use sienna_types::subscription::Subscription;
use sienna_types::{IdentityId, TokenId, WalletAddress};

use crate::{DbError, Result};

const COLUMNS: &str = "token_id, subscriber_id, creator_wallet, price, started_at, \
     expires_at, active, auto_renew, cancelled_at";

/// Insert a new subscription row.
///
/// A duplicate token id surfaces as [`DbError::Constraint`].
pub fn insert(conn: &Connection, sub: &Subscription) -> Result<()> {
    conn.execute(
        "INSERT INTO subscriptions
             (token_id, subscriber_id, creator_wallet, price, started_at,
              expires_at, active, auto_renew, cancelled_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            sub.token_id as i64,
            sub.subscriber_id,
            sub.creator_wallet.as_str(),
            sub.price as i64,
            sub.started_at as i64,
            sub.expires_at as i64,
            sub.active as i64,
            sub.auto_renew as i64,
            sub.cancelled_at.map(|t| t as i64),
        ],
    )
    .map_err(DbError::classify)?;
    Ok(())
}

/// Look a subscription up by token id.
pub fn get(conn: &Connection, token_id: TokenId) -> Result<Option<Subscription>> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM subscriptions WHERE token_id = ?1"),
            [token_id as i64],
            raw_from_row,
        )
        .optional()?;
    raw.map(into_subscription).transpose()
}

/// Extend the expiry by `period` seconds from its current value and flag the
/// row active. The extension compounds: back-to-back renewals each add a
/// full period regardless of when they run.
///
/// Returns the number of rows updated (0 if the token id is unknown).
pub fn extend_expiry(conn: &Connection, token_id: TokenId, period: u64) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE subscriptions
         SET expires_at = expires_at + ?2, active = 1, cancelled_at = NULL
         WHERE token_id = ?1",
        rusqlite::params![token_id as i64, period as i64],
    )?)
}

/// Deactivate a subscription, conditional on it being active. Returns the
/// number of rows updated: 0 means missing or already inactive, so two
/// concurrent cancellations cannot both win.
pub fn deactivate(conn: &Connection, token_id: TokenId, cancelled_at: u64) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE subscriptions
         SET active = 0, auto_renew = 0, cancelled_at = ?2
         WHERE token_id = ?1 AND active = 1",
        rusqlite::params![token_id as i64, cancelled_at as i64],
    )?)
}

/// Subscriptions held by an identity, newest first.
pub fn list_by_subscriber(conn: &Connection, subscriber_id: IdentityId) -> Result<Vec<Subscription>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM subscriptions WHERE subscriber_id = ?1 ORDER BY started_at DESC"
    ))?;
    let raws = stmt
        .query_map([subscriber_id], raw_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raws.into_iter().map(into_subscription).collect()
}

/// The subscriber's subscription to a specific creator, if any. Callers
/// still evaluate effective activity themselves.
pub fn find_for_creator(
    conn: &Connection,
    subscriber_id: IdentityId,
    creator: &WalletAddress,
) -> Result<Option<Subscription>> {
    let raw = conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM subscriptions
                 WHERE subscriber_id = ?1 AND creator_wallet = ?2
                 ORDER BY expires_at DESC LIMIT 1"
            ),
            rusqlite::params![subscriber_id, creator.as_str()],
            raw_from_row,
        )
        .optional()?;
    raw.map(into_subscription).transpose()
}

/// Token ids and creators of rows whose expiry has passed while still
/// flagged active. Feeds the periodic lapse sweep.
pub fn lapsed(conn: &Connection, now: u64) -> Result<Vec<(TokenId, WalletAddress)>> {
    let mut stmt = conn.prepare(
        "SELECT token_id, creator_wallet FROM subscriptions
         WHERE active = 1 AND expires_at < ?1",
    )?;
    let rows = stmt
        .query_map([now as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(id, wallet)| {
            let wallet =
                WalletAddress::parse(&wallet).map_err(|e| DbError::Serialization(e.to_string()))?;
            Ok((id as u64, wallet))
        })
        .collect()
}

/// Flag a lapsed row inactive without recording a cancellation. Conditional
/// on it still being active and still past expiry, so a renewal racing the
/// sweep wins cleanly.
pub fn mark_lapsed(conn: &Connection, token_id: TokenId, now: u64) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE subscriptions SET active = 0
         WHERE token_id = ?1 AND active = 1 AND expires_at < ?2",
        rusqlite::params![token_id as i64, now as i64],
    )?)
}

struct RawSubscription {
    token_id: i64,
    subscriber_id: i64,
    creator_wallet: String,
    price: i64,
    started_at: i64,
    expires_at: i64,
    active: i64,
    auto_renew: i64,
    cancelled_at: Option<i64>,
}

fn raw_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSubscription> {
    Ok(RawSubscription {
        token_id: row.get(0)?,
        subscriber_id: row.get(1)?,
        creator_wallet: row.get(2)?,
        price: row.get(3)?,
        started_at: row.get(4)?,
        expires_at: row.get(5)?,
        active: row.get(6)?,
        auto_renew: row.get(7)?,
        cancelled_at: row.get(8)?,
    })
}

fn into_subscription(raw: RawSubscription) -> Result<Subscription> {
    let creator_wallet = WalletAddress::parse(&raw.creator_wallet)
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    Ok(Subscription {
        token_id: raw.token_id as u64,
        subscriber_id: raw.subscriber_id,
        creator_wallet,
        price: raw.price as u64,
        started_at: raw.started_at as u64,
        expires_at: raw.expires_at as u64,
        active: raw.active != 0,
        auto_renew: raw.auto_renew != 0,
        cancelled_at: raw.cancelled_at.map(|t| t as u64),
    })
}
