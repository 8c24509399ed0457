//! Payment recording and the status machine.
//!
//! `record` relies on the tx_hash primary key for idempotency: the insert
//! itself is the duplicate check. `complete` and `refund` pair a
//! conditional status transition with the creator's earnings adjustment in
//! one database transaction, so the counter can never drift from the rows.

use rusqlite::Connection;
use tracing::debug;

use sienna_db::queries::{creators, payments};
use sienna_db::DbError;
use sienna_types::payment::{Payment, PaymentKind, PaymentStatus};
use sienna_types::{Amount, IdentityId, TxHash, WalletAddress};

use crate::{FeeSplit, LedgerError, Result};

/// Record a new payment in `processing` status.
pub fn record(
    conn: &Connection,
    split: &FeeSplit,
    tx_hash: &TxHash,
    payer_id: IdentityId,
    creator_wallet: &WalletAddress,
    kind: PaymentKind,
    total: Amount,
    now: u64,
) -> Result<Payment> {
    if total == 0 {
        return Err(LedgerError::Validation("zero-amount payment".into()));
    }
    let (platform_fee, creator_amount) = split.split(total)?;

    let payment = Payment {
        tx_hash: tx_hash.clone(),
        payer_id,
        creator_wallet: creator_wallet.clone(),
        total_amount: total,
        platform_fee,
        creator_amount,
        kind,
        status: PaymentStatus::Processing,
        created_at: now,
        updated_at: now,
    };
    match payments::insert(conn, &payment) {
        Ok(()) => {
            debug!(tx_hash = %tx_hash, total, platform_fee, creator_amount, "payment recorded");
            Ok(payment)
        }
        Err(DbError::Constraint(_)) => Err(LedgerError::DuplicateTransaction),
        Err(e) => Err(e.into()),
    }
}

/// Complete a processing payment and credit the creator's earnings.
///
/// Idempotent: a payment already completed is returned unchanged. The
/// transition and the earnings increment commit together or not at all.
pub fn complete(conn: &mut Connection, tx_hash: &TxHash, now: u64) -> Result<Payment> {
    let tx = conn.transaction()?;

    let moved = payments::transition_status(
        &tx,
        tx_hash,
        PaymentStatus::Processing,
        PaymentStatus::Completed,
        now,
    )?;
    let payment = payments::get(&tx, tx_hash)?.ok_or(LedgerError::NotFound)?;

    if moved == 0 {
        // No transition happened; decide from the row's actual status.
        return match payment.status {
            PaymentStatus::Completed => Ok(payment),
            other => Err(LedgerError::InvalidState(other)),
        };
    }

    creators::adjust_earnings(&tx, &payment.creator_wallet, payment.creator_amount as i64)?;
    tx.commit()?;
    debug!(tx_hash = %tx_hash, amount = payment.creator_amount, "payment completed");
    Ok(payment)
}

/// Refund a completed payment, debiting the creator's earnings.
///
/// Only the payer or the receiving creator may refund. Monotonic: a
/// refunded payment never returns to any earlier status, and a second
/// refund is `InvalidState`.
pub fn refund(
    conn: &mut Connection,
    tx_hash: &TxHash,
    requestor_id: IdentityId,
    requestor_wallet: Option<&WalletAddress>,
    now: u64,
) -> Result<Payment> {
    let tx = conn.transaction()?;

    let payment = payments::get(&tx, tx_hash)?.ok_or(LedgerError::NotFound)?;
    let is_payer = payment.payer_id == requestor_id;
    let is_creator = requestor_wallet == Some(&payment.creator_wallet);
    if !is_payer && !is_creator {
        return Err(LedgerError::Forbidden);
    }

    let moved = payments::transition_status(
        &tx,
        tx_hash,
        PaymentStatus::Completed,
        PaymentStatus::Refunded,
        now,
    )?;
    if moved == 0 {
        return Err(LedgerError::InvalidState(payment.status));
    }

    creators::adjust_earnings(&tx, &payment.creator_wallet, -(payment.creator_amount as i64))?;
    tx.commit()?;
    debug!(tx_hash = %tx_hash, amount = payment.creator_amount, "payment refunded");

    Ok(payments::get(conn, tx_hash)?.ok_or(LedgerError::NotFound)?)
}

/// Mark a processing payment failed. No counters move; the money never
/// reached the creator.
pub fn fail(conn: &Connection, tx_hash: &TxHash, now: u64) -> Result<Payment> {
    let moved = payments::transition_status(
        conn,
        tx_hash,
        PaymentStatus::Processing,
        PaymentStatus::Failed,
        now,
    )?;
    let payment = payments::get(conn, tx_hash)?.ok_or(LedgerError::NotFound)?;
    if moved == 0 && payment.status != PaymentStatus::Failed {
        return Err(LedgerError::InvalidState(payment.status));
    }
    Ok(payment)
}
