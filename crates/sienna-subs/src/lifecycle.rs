//! Create, renew, cancel, and lapse subscriptions.
//!
//! Renewal compounds from the stored expiry, never from the clock: two
//! back-to-back renewals buy two full periods no matter when they arrive.

use rusqlite::Connection;
use tracing::debug;

use sienna_db::queries::{creators, subscriptions};
use sienna_db::DbError;
use sienna_types::subscription::Subscription;
use sienna_types::{Amount, IdentityId, TokenId, WalletAddress};

use crate::{LifecycleError, Result};

/// Create a subscription for a freshly minted membership token.
///
/// Chain `Subscribed` events carry the contract's authoritative `end_time`;
/// request-path callers pass `None` and get `now + period`. The insert and
/// the subscriber-count increment commit together.
pub fn create(
    conn: &mut Connection,
    token_id: TokenId,
    subscriber_id: IdentityId,
    creator_wallet: &WalletAddress,
    price: Amount,
    end_time: Option<u64>,
    period: u64,
    now: u64,
) -> Result<Subscription> {
    let expires_at = end_time.unwrap_or(now + period);
    if expires_at < now {
        return Err(LifecycleError::Validation(format!(
            "expiry {expires_at} before start {now}"
        )));
    }

    let sub = Subscription {
        token_id,
        subscriber_id,
        creator_wallet: creator_wallet.clone(),
        price,
        started_at: now,
        expires_at,
        active: true,
        auto_renew: true,
        cancelled_at: None,
    };

    let tx = conn.transaction()?;
    match subscriptions::insert(&tx, &sub) {
        Ok(()) => {}
        Err(DbError::Constraint(_)) => return Err(LifecycleError::DuplicateToken),
        Err(e) => return Err(e.into()),
    }
    creators::adjust_subscriber_count(&tx, creator_wallet, 1)?;
    tx.commit()?;
    debug!(token_id, subscriber_id, creator = %creator_wallet, expires_at, "subscription created");
    Ok(sub)
}

/// Extend a subscription by one period from its current expiry.
///
/// An inactive row is reactivated, which re-increments the creator's
/// counter; an active row renews with no counter change.
pub fn renew(
    conn: &mut Connection,
    token_id: TokenId,
    requestor_id: IdentityId,
    period: u64,
) -> Result<Subscription> {
    let tx = conn.transaction()?;

    let before = subscriptions::get(&tx, token_id)?.ok_or(LifecycleError::NotFound)?;
    if before.subscriber_id != requestor_id {
        return Err(LifecycleError::Forbidden);
    }

    subscriptions::extend_expiry(&tx, token_id, period)?;
    if !before.active {
        creators::adjust_subscriber_count(&tx, &before.creator_wallet, 1)?;
    }

    let renewed = subscriptions::get(&tx, token_id)?.ok_or(LifecycleError::NotFound)?;
    tx.commit()?;
    debug!(token_id, expires_at = renewed.expires_at, reactivated = !before.active, "subscription renewed");
    Ok(renewed)
}

/// Cancel a subscription at the subscriber's request.
///
/// A row that is already inactive (cancelled earlier, or swept as lapsed)
/// is `InvalidState` and the counter does not move again.
pub fn cancel(
    conn: &mut Connection,
    token_id: TokenId,
    requestor_id: IdentityId,
    now: u64,
) -> Result<Subscription> {
    let tx = conn.transaction()?;

    let before = subscriptions::get(&tx, token_id)?.ok_or(LifecycleError::NotFound)?;
    if before.subscriber_id != requestor_id {
        return Err(LifecycleError::Forbidden);
    }

    if subscriptions::deactivate(&tx, token_id, now)? == 0 {
        return Err(LifecycleError::InvalidState);
    }
    creators::adjust_subscriber_count(&tx, &before.creator_wallet, -1)?;

    let cancelled = subscriptions::get(&tx, token_id)?.ok_or(LifecycleError::NotFound)?;
    tx.commit()?;
    debug!(token_id, "subscription cancelled");
    Ok(cancelled)
}

/// Cancel driven by an on-chain `SubscriptionCancelled` event. The chain is
/// authoritative, so there is no requestor check; an already-inactive row
/// is a redelivery no-op.
pub fn cancel_from_chain(
    conn: &mut Connection,
    token_id: TokenId,
    cancelled_at: u64,
) -> Result<Subscription> {
    let tx = conn.transaction()?;

    let before = subscriptions::get(&tx, token_id)?.ok_or(LifecycleError::NotFound)?;
    if subscriptions::deactivate(&tx, token_id, cancelled_at)? == 1 {
        creators::adjust_subscriber_count(&tx, &before.creator_wallet, -1)?;
    }
    let row = subscriptions::get(&tx, token_id)?.ok_or(LifecycleError::NotFound)?;
    tx.commit()?;
    Ok(row)
}

/// Sweep rows whose expiry passed while still flagged active, decrementing
/// the affected creators' counters. Returns the number of rows swept.
///
/// Each row is swept with a conditional update, so a renewal racing the
/// sweep wins cleanly and the counter never double-moves.
pub fn expire_lapsed(conn: &mut Connection, now: u64) -> Result<usize> {
    let tx = conn.transaction()?;

    let mut swept = 0;
    for (token_id, creator_wallet) in subscriptions::lapsed(&tx, now)? {
        if subscriptions::mark_lapsed(&tx, token_id, now)? == 1 {
            creators::adjust_subscriber_count(&tx, &creator_wallet, -1)?;
            swept += 1;
        }
    }
    tx.commit()?;
    if swept > 0 {
        debug!(swept, "lapsed subscriptions swept");
    }
    Ok(swept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sienna_db::queries::identities;
    use sienna_types::identity::Role;
    use sienna_types::SUBSCRIPTION_PERIOD_SECS;

    const PERIOD: u64 = SUBSCRIPTION_PERIOD_SECS;

    fn setup() -> (Connection, IdentityId, WalletAddress) {
        let conn = sienna_db::open_memory().expect("open test db");
        let fan_wallet = WalletAddress::from_bytes(&[1u8; 20]);
        let fan =
            identities::insert_wallet(&conn, &fan_wallet, "fan", Role::Fan, 100).expect("fan");
        let creator_wallet = WalletAddress::from_bytes(&[2u8; 20]);
        let creator_id =
            identities::insert_wallet(&conn, &creator_wallet, "creator", Role::Creator, 100)
                .expect("creator");
        creators::insert_stub(&conn, &creator_wallet, creator_id, "The Creator").expect("stub");
        (conn, fan, creator_wallet)
    }

    fn subscriber_count(conn: &Connection, wallet: &WalletAddress) -> u64 {
        creators::get(conn, wallet)
            .expect("query")
            .expect("profile")
            .subscriber_count
    }

    #[test]
    fn test_create_defaults_and_counts() {
        let (mut conn, fan, creator) = setup();
        let sub = create(&mut conn, 1, fan, &creator, 1_000, None, PERIOD, 5_000)
            .expect("create");
        assert_eq!(sub.expires_at, 5_000 + PERIOD);
        assert!(sub.active);
        assert!(sub.auto_renew);
        assert_eq!(subscriber_count(&conn, &creator), 1);
    }

    #[test]
    fn test_create_honors_chain_end_time() {
        let (mut conn, fan, creator) = setup();
        let sub = create(&mut conn, 2, fan, &creator, 1_000, Some(9_999), PERIOD, 5_000)
            .expect("create");
        assert_eq!(sub.expires_at, 9_999);
    }

    #[test]
    fn test_duplicate_token_rolls_back_counter() {
        let (mut conn, fan, creator) = setup();
        create(&mut conn, 3, fan, &creator, 1_000, None, PERIOD, 5_000).expect("create");
        assert!(matches!(
            create(&mut conn, 3, fan, &creator, 1_000, None, PERIOD, 5_001),
            Err(LifecycleError::DuplicateToken)
        ));
        assert_eq!(subscriber_count(&conn, &creator), 1);
    }

    #[test]
    fn test_create_rejects_past_expiry() {
        let (mut conn, fan, creator) = setup();
        assert!(matches!(
            create(&mut conn, 4, fan, &creator, 1_000, Some(4_000), PERIOD, 5_000),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn test_renew_compounds_from_expiry() {
        let (mut conn, fan, creator) = setup();
        create(&mut conn, 5, fan, &creator, 1_000, None, PERIOD, 5_000).expect("create");

        // Two immediate renewals buy two full periods on top of the first.
        renew(&mut conn, 5, fan, PERIOD).expect("renew");
        let sub = renew(&mut conn, 5, fan, PERIOD).expect("renew again");
        assert_eq!(sub.expires_at, 5_000 + 3 * PERIOD);
        // No counter change for renewals of an active row.
        assert_eq!(subscriber_count(&conn, &creator), 1);
    }

    #[test]
    fn test_renew_guards() {
        let (mut conn, fan, creator) = setup();
        let other = identities::insert_wallet(
            &conn,
            &WalletAddress::from_bytes(&[9u8; 20]),
            "other",
            Role::Fan,
            100,
        )
        .expect("other");
        create(&mut conn, 6, fan, &creator, 1_000, None, PERIOD, 5_000).expect("create");

        assert!(matches!(
            renew(&mut conn, 6, other, PERIOD),
            Err(LifecycleError::Forbidden)
        ));
        assert!(matches!(
            renew(&mut conn, 99, fan, PERIOD),
            Err(LifecycleError::NotFound)
        ));
    }

    #[test]
    fn test_renew_reactivates_and_reincrements() {
        let (mut conn, fan, creator) = setup();
        create(&mut conn, 7, fan, &creator, 1_000, None, PERIOD, 5_000).expect("create");
        cancel(&mut conn, 7, fan, 6_000).expect("cancel");
        assert_eq!(subscriber_count(&conn, &creator), 0);

        let sub = renew(&mut conn, 7, fan, PERIOD).expect("renew");
        assert!(sub.active);
        assert_eq!(sub.cancelled_at, None);
        assert_eq!(sub.expires_at, 5_000 + 2 * PERIOD);
        assert_eq!(subscriber_count(&conn, &creator), 1);
    }

    #[test]
    fn test_cancel_once() {
        let (mut conn, fan, creator) = setup();
        create(&mut conn, 8, fan, &creator, 1_000, None, PERIOD, 5_000).expect("create");

        let sub = cancel(&mut conn, 8, fan, 6_000).expect("cancel");
        assert!(!sub.active);
        assert!(!sub.auto_renew);
        assert_eq!(sub.cancelled_at, Some(6_000));
        assert_eq!(subscriber_count(&conn, &creator), 0);

        // Second cancel: invalid state, counter untouched.
        assert!(matches!(
            cancel(&mut conn, 8, fan, 6_001),
            Err(LifecycleError::InvalidState)
        ));
        assert_eq!(subscriber_count(&conn, &creator), 0);
    }

    #[test]
    fn test_cancel_forbidden_for_non_subscriber() {
        let (mut conn, fan, creator) = setup();
        let other = identities::insert_wallet(
            &conn,
            &WalletAddress::from_bytes(&[9u8; 20]),
            "other",
            Role::Fan,
            100,
        )
        .expect("other");
        create(&mut conn, 9, fan, &creator, 1_000, None, PERIOD, 5_000).expect("create");
        assert!(matches!(
            cancel(&mut conn, 9, other, 6_000),
            Err(LifecycleError::Forbidden)
        ));
        assert_eq!(subscriber_count(&conn, &creator), 1);
    }

    #[test]
    fn test_chain_cancel_skips_requestor_check_and_is_idempotent() {
        let (mut conn, fan, creator) = setup();
        create(&mut conn, 10, fan, &creator, 1_000, None, PERIOD, 5_000).expect("create");

        let sub = cancel_from_chain(&mut conn, 10, 6_000).expect("chain cancel");
        assert!(!sub.active);
        assert_eq!(subscriber_count(&conn, &creator), 0);

        // Redelivery: no-op, no double decrement.
        let again = cancel_from_chain(&mut conn, 10, 6_001).expect("redelivered");
        assert!(!again.active);
        assert_eq!(subscriber_count(&conn, &creator), 0);

        assert!(matches!(
            cancel_from_chain(&mut conn, 404, 6_002),
            Err(LifecycleError::NotFound)
        ));
    }

    #[test]
    fn test_lapse_sweep() {
        let (mut conn, fan, creator) = setup();
        create(&mut conn, 11, fan, &creator, 1_000, Some(6_000), PERIOD, 5_000).expect("create");
        create(&mut conn, 12, fan, &creator, 1_000, Some(9_000), PERIOD, 5_000).expect("create");
        assert_eq!(subscriber_count(&conn, &creator), 2);

        // Only token 11 has lapsed at t=7000.
        assert_eq!(expire_lapsed(&mut conn, 7_000).expect("sweep"), 1);
        assert_eq!(subscriber_count(&conn, &creator), 1);

        // Sweep again: nothing new.
        assert_eq!(expire_lapsed(&mut conn, 7_001).expect("sweep"), 0);

        // Cancelling the lapsed row is InvalidState, not a double decrement.
        assert!(matches!(
            cancel(&mut conn, 11, fan, 7_100),
            Err(LifecycleError::InvalidState)
        ));
        assert_eq!(subscriber_count(&conn, &creator), 1);

        // A lapsed row keeps no cancelled_at and can still be renewed back.
        let lapsed_row = subscriptions::get(&conn, 11).expect("query").expect("row");
        assert_eq!(lapsed_row.cancelled_at, None);
        let renewed = renew(&mut conn, 11, fan, PERIOD).expect("renew");
        assert!(renewed.active);
        assert_eq!(renewed.expires_at, 6_000 + PERIOD);
        assert_eq!(subscriber_count(&conn, &creator), 2);
    }
}
