//! Payment query functions.
//!
//! The transaction hash primary key is the ledger's idempotency key: inserts
//! are always attempted and a uniqueness violation is the duplicate signal.
//! Status moves only through conditional updates whose WHERE clause encodes
//! the required prior state.

use rusqlite::{Connection, OptionalExtension};

use sienna_types::payment::{Payment, PaymentKind, PaymentStatus};
use sienna_types::{TxHash, WalletAddress};

use crate::{DbError, Result};

const COLUMNS: &str = "tx_hash, payer_id, creator_wallet, total_amount, platform_fee, \
     creator_amount, kind, status, created_at, updated_at";

/// Insert a new payment row in `processing` status.
///
/// A duplicate transaction hash surfaces as [`DbError::Constraint`]; callers
/// treat that as the concurrent-delivery duplicate signal.
pub fn insert(conn: &Connection, payment: &Payment) -> Result<()> {
    conn.execute(
        "INSERT INTO payments
             (tx_hash, payer_id, creator_wallet, total_amount, platform_fee,
              creator_amount, kind, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            payment.tx_hash.as_str(),
            payment.payer_id,
            payment.creator_wallet.as_str(),
            payment.total_amount as i64,
            payment.platform_fee as i64,
            payment.creator_amount as i64,
            payment.kind.as_str(),
            payment.status.as_str(),
            payment.created_at as i64,
            payment.updated_at as i64,
        ],
    )
    .map_err(DbError::classify)?;
    Ok(())
}

/// Look a payment up by transaction hash.
pub fn get(conn: &Connection, tx_hash: &TxHash) -> Result<Option<Payment>> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM payments WHERE tx_hash = ?1"),
            [tx_hash.as_str()],
            raw_from_row,
        )
        .optional()?;
    raw.map(into_payment).transpose()
}

/// Transition a payment's status, conditional on its current status.
///
/// Returns the number of rows updated: 1 on the transition, 0 if the row is
/// missing or not in `from` status. Concurrent callers cannot both win.
pub fn transition_status(
    conn: &Connection,
    tx_hash: &TxHash,
    from: PaymentStatus,
    to: PaymentStatus,
    now: u64,
) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE payments SET status = ?3, updated_at = ?4
         WHERE tx_hash = ?1 AND status = ?2",
        rusqlite::params![tx_hash.as_str(), from.as_str(), to.as_str(), now as i64],
    )?)
}

/// Payments made by an identity, newest first.
pub fn list_by_payer(conn: &Connection, payer_id: i64) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM payments WHERE payer_id = ?1 ORDER BY created_at DESC"
    ))?;
    let raws = stmt
        .query_map([payer_id], raw_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raws.into_iter().map(into_payment).collect()
}

/// Payments received by a creator, newest first.
pub fn list_by_creator(conn: &Connection, creator: &WalletAddress) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM payments WHERE creator_wallet = ?1 ORDER BY created_at DESC"
    ))?;
    let raws = stmt
        .query_map([creator.as_str()], raw_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raws.into_iter().map(into_payment).collect()
}

struct RawPayment {
    tx_hash: String,
    payer_id: i64,
    creator_wallet: String,
    total_amount: i64,
    platform_fee: i64,
    creator_amount: i64,
    kind: String,
    status: String,
    created_at: i64,
    updated_at: i64,
}

fn raw_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPayment> {
    Ok(RawPayment {
        tx_hash: row.get(0)?,
        payer_id: row.get(1)?,
        creator_wallet: row.get(2)?,
        total_amount: row.get(3)?,
        platform_fee: row.get(4)?,
        creator_amount: row.get(5)?,
        kind: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn into_payment(raw: RawPayment) -> Result<Payment> {
    let tx_hash =
        TxHash::parse(&raw.tx_hash).map_err(|e| DbError::Serialization(e.to_string()))?;
    let creator_wallet = WalletAddress::parse(&raw.creator_wallet)
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    let kind = PaymentKind::parse(&raw.kind)
        .ok_or_else(|| DbError::Serialization(format!("unknown payment kind '{}'", raw.kind)))?;
    let status = PaymentStatus::parse(&raw.status).ok_or_else(|| {
        DbError::Serialization(format!("unknown payment status '{}'", raw.status))
    })?;
    Ok(Payment {
        tx_hash,
        payer_id: raw.payer_id,
        creator_wallet,
        total_amount: raw.total_amount as u64,
        platform_fee: raw.platform_fee as u64,
        creator_amount: raw.creator_amount as u64,
        kind,
        status,
        created_at: raw.created_at as u64,
        updated_at: raw.updated_at as u64,
    })
}
