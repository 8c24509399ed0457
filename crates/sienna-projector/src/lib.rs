//! # sienna-projector
//!
//! Projects decoded contract events into the relational store.
//!
//! Delivery upstream is at-least-once and unordered, so every arm of
//! [`Projector::apply`] is idempotent, keyed by the event's natural
//! identifier (wallet address, transaction hash, token id). Redelivered
//! duplicates are swallowed quietly; events that reference state the store
//! has never seen (orphans) are logged and skipped, never fabricated.
//! Each event is applied in isolation: one bad event does not stop the
//! stream.

use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use sienna_crypto::nonce::random_handle;
use sienna_db::{queries, DbError};
use sienna_ledger::{FeeSplit, LedgerError};
use sienna_subs::LifecycleError;
use sienna_types::event::{
    ChainEvent, CreatorRegistered, CreatorVerified, EventBody, EventMeta, PaymentCompleted,
    PaymentReceived, Subscribed, SubscriptionCancelled,
};
use sienna_types::identity::Role;
use sienna_types::{IdentityId, WalletAddress};

/// Error types for projection. Duplicates and orphans never surface here;
/// only genuine store failures do.
#[derive(Debug, thiserror::Error)]
pub enum ProjectorError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

pub type Result<T> = std::result::Result<T, ProjectorError>;

/// Applies chain events to the store.
pub struct Projector {
    split: FeeSplit,
    period: u64,
}

impl Projector {
    pub fn new(split: FeeSplit, period: u64) -> Self {
        Self { split, period }
    }

    /// Apply one event. Idempotent for every arm; `now` stamps rows the
    /// event itself carries no timestamp for.
    pub fn apply(&self, conn: &mut Connection, event: &ChainEvent, now: u64) -> Result<()> {
        match &event.body {
            EventBody::CreatorRegistered(e) => self.creator_registered(conn, &event.meta, e),
            EventBody::CreatorVerified(e) => self.creator_verified(conn, e),
            EventBody::PaymentReceived(e) => self.payment_received(conn, &event.meta, e, now),
            EventBody::PaymentCompleted(e) => self.payment_completed(conn, e, now),
            EventBody::Subscribed(e) => self.subscribed(conn, e, now),
            EventBody::SubscriptionCancelled(e) => self.subscription_cancelled(conn, e),
        }
    }

    /// Resolve the identity for a wallet, creating a fresh one if the chain
    /// saw this wallet before any login did.
    fn identity_for_wallet(
        &self,
        conn: &Connection,
        wallet: &WalletAddress,
        role: Role,
        now: u64,
    ) -> Result<IdentityId> {
        if let Some(identity) = queries::identities::find_by_wallet(conn, wallet)? {
            return Ok(identity.id);
        }
        let handle = random_handle();
        let id = queries::identities::insert_wallet(conn, wallet, &handle, role, now)?;
        debug!(wallet = %wallet, handle, "identity created from chain event");
        Ok(id)
    }

    fn creator_registered(
        &self,
        conn: &Connection,
        meta: &EventMeta,
        e: &CreatorRegistered,
    ) -> Result<()> {
        let identity_id = self.identity_for_wallet(conn, &e.creator, Role::Creator, e.timestamp)?;
        queries::identities::promote_to_creator(conn, identity_id)?;

        if queries::creators::get(conn, &e.creator)?.is_some() {
            // Redelivery or a pre-existing stub: refresh the on-chain fields.
            match queries::creators::update_registration(
                conn,
                &e.creator,
                &e.name,
                &meta.contract,
                e.timestamp,
            ) {
                Ok(_) => return Ok(()),
                Err(DbError::Constraint(_)) => {
                    // Another creator holds this display name; keep the old one.
                    warn!(wallet = %e.creator, name = %e.name, "registered name already taken, keeping current");
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
        }

        match queries::creators::insert_registered(
            conn,
            &e.creator,
            identity_id,
            &e.name,
            &meta.contract,
            e.timestamp,
        ) {
            Ok(()) => Ok(()),
            Err(DbError::Constraint(_)) => {
                // Display name taken (or a concurrent insert won); fall back
                // to the identity handle, which is unique.
                let identity = queries::identities::get(conn, identity_id)?;
                match queries::creators::insert_registered(
                    conn,
                    &e.creator,
                    identity_id,
                    &identity.handle,
                    &meta.contract,
                    e.timestamp,
                ) {
                    Ok(()) | Err(DbError::Constraint(_)) => Ok(()),
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    fn creator_verified(&self, conn: &Connection, e: &CreatorVerified) -> Result<()> {
        if queries::creators::set_verified(conn, &e.creator)? == 0 {
            warn!(wallet = %e.creator, "verification event for unknown creator, skipping");
        }
        Ok(())
    }

    fn payment_received(
        &self,
        conn: &mut Connection,
        meta: &EventMeta,
        e: &PaymentReceived,
        now: u64,
    ) -> Result<()> {
        let Some(payer) = queries::identities::find_by_wallet(conn, &e.payer)? else {
            warn!(tx_hash = %meta.tx_hash, payer = %e.payer, "payment from unknown payer, skipping");
            return Ok(());
        };
        if queries::creators::get(conn, &e.creator)?.is_none() {
            warn!(tx_hash = %meta.tx_hash, creator = %e.creator, "payment to unknown creator, skipping");
            return Ok(());
        }

        match sienna_ledger::record(
            conn,
            &self.split,
            &meta.tx_hash,
            payer.id,
            &e.creator,
            e.kind,
            e.amount,
            now,
        ) {
            Ok(_) => Ok(()),
            Err(LedgerError::DuplicateTransaction) => {
                debug!(tx_hash = %meta.tx_hash, "payment already recorded");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn payment_completed(
        &self,
        conn: &mut Connection,
        e: &PaymentCompleted,
        now: u64,
    ) -> Result<()> {
        match sienna_ledger::complete(conn, &e.tx_id, now) {
            Ok(_) => Ok(()),
            Err(LedgerError::NotFound) => {
                // Completion arrived before (or without) the payment row.
                // Never fabricate; backfill redelivers the pair in order.
                warn!(tx_hash = %e.tx_id, "completion for unknown payment, skipping");
                Ok(())
            }
            Err(LedgerError::InvalidState(status)) => {
                warn!(tx_hash = %e.tx_id, ?status, "completion for settled payment, skipping");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn subscribed(&self, conn: &mut Connection, e: &Subscribed, now: u64) -> Result<()> {
        if queries::creators::get(conn, &e.creator)?.is_none() {
            warn!(token_id = e.token_id, creator = %e.creator, "subscription to unknown creator, skipping");
            return Ok(());
        }
        let subscriber_id = self.identity_for_wallet(conn, &e.subscriber, Role::Fan, now)?;

        match sienna_subs::create(
            conn,
            e.token_id,
            subscriber_id,
            &e.creator,
            e.price,
            Some(e.end_time),
            self.period,
            now.min(e.end_time),
        ) {
            Ok(_) => Ok(()),
            Err(LifecycleError::DuplicateToken) => {
                debug!(token_id = e.token_id, "subscription already recorded");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn subscription_cancelled(
        &self,
        conn: &mut Connection,
        e: &SubscriptionCancelled,
    ) -> Result<()> {
        match sienna_subs::cancel_from_chain(conn, e.token_id, e.timestamp) {
            Ok(_) => Ok(()),
            Err(LifecycleError::NotFound) => {
                // Cancel delivered before its subscribe; the backfill replay
                // will deliver the pair again in order.
                warn!(token_id = e.token_id, "cancellation for unknown subscription, skipping");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Consume the event stream until shutdown. Every event is applied in
    /// isolation: a failing apply is logged and the stream continues, and a
    /// lagged receiver logs the gap (the persisted-cursor backfill covers
    /// it on restart).
    pub async fn run(
        &self,
        db: Arc<Mutex<Connection>>,
        mut events: broadcast::Receiver<ChainEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("projector stopping");
                    return;
                }
                received = events.recv() => match received {
                    Ok(event) => {
                        let mut conn = db.lock().await;
                        if let Err(e) = self.apply(&mut conn, &event, sienna_types::unix_now()) {
                            warn!(event = event.name(), tx_hash = %event.meta.tx_hash, error = %e,
                                  "failed to project event");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "projector lagged behind the event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("event bus closed, projector stopping");
                        return;
                    }
                },
            }
        }
    }
}
