//! Integration test: subscription lifecycle across the request path, the
//! projector, and the lapse sweep.
//!
//! 1. Out-of-order chain delivery: a cancel before its subscribe is skipped,
//!    and the late subscribe still lands active
//! 2. Renewal compounds from the stored expiry, never from the clock
//! 3. Cancel is terminal for the request path; the counter never
//!    double-decrements
//! 4. The lapse sweep deactivates overdue rows and a later renew reactivates

use rusqlite::Connection;

use sienna_db::queries;
use sienna_ledger::FeeSplit;
use sienna_projector::Projector;
use sienna_subs::LifecycleError;
use sienna_types::event::{
    ChainEvent, CreatorRegistered, EventBody, EventMeta, Subscribed, SubscriptionCancelled,
};
use sienna_types::identity::Role;
use sienna_types::{IdentityId, TxHash, WalletAddress, SUBSCRIPTION_PERIOD_SECS};

const PERIOD: u64 = SUBSCRIPTION_PERIOD_SECS;

fn wallet(byte: u8) -> WalletAddress {
    WalletAddress::from_bytes(&[byte; 20])
}

fn meta(tx_byte: u8, block: u64) -> EventMeta {
    EventMeta {
        tx_hash: TxHash::from_bytes(&[tx_byte; 32]),
        block_number: block,
        contract: wallet(0xCC),
    }
}

fn projector() -> Projector {
    Projector::new(FeeSplit::default(), PERIOD)
}

fn setup(creator: &WalletAddress) -> Connection {
    let mut conn = sienna_db::open_memory().expect("open");
    let event = ChainEvent {
        meta: meta(0xA0, 10),
        body: EventBody::CreatorRegistered(CreatorRegistered {
            creator: creator.clone(),
            name: "Creator".to_string(),
            timestamp: 1_700_000_000,
        }),
    };
    projector().apply(&mut conn, &event, 1_000).expect("register");
    conn
}

fn subscriber(conn: &Connection, byte: u8) -> IdentityId {
    queries::identities::insert_wallet(
        conn,
        &wallet(byte),
        &format!("fan_{byte}"),
        Role::Fan,
        100,
    )
    .expect("subscriber")
}

fn count(conn: &Connection, creator: &WalletAddress) -> u64 {
    queries::creators::get(conn, creator)
        .expect("query")
        .expect("profile")
        .subscriber_count
}

#[test]
fn cancel_before_subscribe_is_skipped_then_subscribe_lands() {
    let creator = wallet(1);
    let fan = wallet(2);
    let mut conn = setup(&creator);
    let p = projector();

    // The cancel arrives first (unordered delivery). Skipped, not fabricated.
    let cancel = ChainEvent {
        meta: meta(0xC0, 20),
        body: EventBody::SubscriptionCancelled(SubscriptionCancelled {
            token_id: 7,
            subscriber: fan.clone(),
            timestamp: 1_500,
        }),
    };
    p.apply(&mut conn, &cancel, 1_500).expect("orphan cancel skipped");
    assert!(queries::subscriptions::get(&conn, 7).expect("query").is_none());

    // The subscribe lands later and the subscription is simply active;
    // the stale cancel is gone for good.
    let subscribe = ChainEvent {
        meta: meta(0xC1, 21),
        body: EventBody::Subscribed(Subscribed {
            token_id: 7,
            subscriber: fan.clone(),
            creator: creator.clone(),
            price: 2_500,
            end_time: 1_000 + PERIOD,
        }),
    };
    p.apply(&mut conn, &subscribe, 1_600).expect("subscribe");

    let sub = queries::subscriptions::get(&conn, 7)
        .expect("query")
        .expect("row");
    assert!(sub.active);
    assert_eq!(count(&conn, &creator), 1);
}

#[test]
fn renewal_compounds_from_stored_expiry() {
    let creator = wallet(3);
    let mut conn = setup(&creator);
    let fan = subscriber(&conn, 4);
    let start = 5_000;

    let sub = sienna_subs::create(&mut conn, 11, fan, &creator, 2_500, None, PERIOD, start)
        .expect("create");
    assert_eq!(sub.expires_at, start + PERIOD);

    // Two back-to-back renewals extend from the stored expiry, not from now.
    sienna_subs::renew(&mut conn, 11, fan, PERIOD).expect("renew once");
    let renewed = sienna_subs::renew(&mut conn, 11, fan, PERIOD).expect("renew twice");
    assert_eq!(renewed.expires_at, start + 3 * PERIOD);
    assert_eq!(count(&conn, &creator), 1);

    // Only the subscriber may renew.
    let other = subscriber(&conn, 5);
    let forbidden = sienna_subs::renew(&mut conn, 11, other, PERIOD);
    assert!(matches!(forbidden, Err(LifecycleError::Forbidden)));
}

#[test]
fn cancel_is_terminal_and_counter_stays_consistent() {
    let creator = wallet(6);
    let mut conn = setup(&creator);
    let fan = subscriber(&conn, 7);

    sienna_subs::create(&mut conn, 21, fan, &creator, 2_500, None, PERIOD, 5_000)
        .expect("create");
    assert_eq!(count(&conn, &creator), 1);

    let cancelled = sienna_subs::cancel(&mut conn, 21, fan, 6_000).expect("cancel");
    assert!(!cancelled.active);
    assert_eq!(cancelled.cancelled_at, Some(6_000));
    assert_eq!(count(&conn, &creator), 0);

    // Second cancel is an invalid transition and must not decrement again.
    let again = sienna_subs::cancel(&mut conn, 21, fan, 6_001);
    assert!(matches!(again, Err(LifecycleError::InvalidState)));
    assert_eq!(count(&conn, &creator), 0);

    // A redelivered chain cancel is a quiet no-op too.
    sienna_subs::cancel_from_chain(&mut conn, 21, 6_002).expect("chain cancel no-op");
    assert_eq!(count(&conn, &creator), 0);
}

#[test]
fn lapse_sweep_and_renew_reactivation() {
    let creator = wallet(8);
    let mut conn = setup(&creator);
    let fan = subscriber(&conn, 9);
    let start = 5_000;

    sienna_subs::create(&mut conn, 31, fan, &creator, 2_500, None, PERIOD, start)
        .expect("create");

    // Before expiry the sweep touches nothing.
    assert_eq!(
        sienna_subs::expire_lapsed(&mut conn, start + PERIOD - 1).expect("sweep"),
        0
    );
    assert_eq!(count(&conn, &creator), 1);

    // Past expiry the row lapses and the counter drops; the sweep is
    // idempotent.
    let lapsed_at = start + PERIOD + 1;
    assert_eq!(sienna_subs::expire_lapsed(&mut conn, lapsed_at).expect("sweep"), 1);
    assert_eq!(sienna_subs::expire_lapsed(&mut conn, lapsed_at).expect("resweep"), 0);
    assert_eq!(count(&conn, &creator), 0);
    assert!(!queries::subscriptions::get(&conn, 31)
        .expect("query")
        .expect("row")
        .active);

    // Renewing a lapsed subscription reactivates it and re-increments the
    // counter exactly once.
    let renewed = sienna_subs::renew(&mut conn, 31, fan, PERIOD).expect("renew");
    assert!(renewed.active);
    assert_eq!(renewed.expires_at, start + 2 * PERIOD);
    assert_eq!(count(&conn, &creator), 1);
}

#[test]
fn duplicate_token_is_a_conflict_with_one_counter_bump() {
    let creator = wallet(10);
    let mut conn = setup(&creator);
    let fan = subscriber(&conn, 11);

    sienna_subs::create(&mut conn, 41, fan, &creator, 2_500, None, PERIOD, 5_000)
        .expect("create");
    let dup = sienna_subs::create(&mut conn, 41, fan, &creator, 2_500, None, PERIOD, 5_001);
    assert!(matches!(dup, Err(LifecycleError::DuplicateToken)));
    assert_eq!(count(&conn, &creator), 1);
}
