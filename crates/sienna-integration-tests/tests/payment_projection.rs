//! Integration test: on-chain payment events projected into the ledger.
//!
//! Exercises the event pipeline end to end:
//! 1. PaymentReceived/PaymentCompleted flow through the bus to the projector
//! 2. Redelivered duplicates settle exactly once (one row, earnings once)
//! 3. The request path and the projector agree on duplicate transactions
//! 4. Refunds reverse earnings and enforce the payer/creator guard

use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::{broadcast, Mutex};

use sienna_chain::EventBus;
use sienna_db::queries;
use sienna_ledger::{FeeSplit, LedgerError};
use sienna_projector::Projector;
use sienna_types::event::{
    ChainEvent, CreatorRegistered, EventBody, EventMeta, PaymentCompleted, PaymentReceived,
};
use sienna_types::identity::Role;
use sienna_types::payment::{PaymentKind, PaymentStatus};
use sienna_types::{TxHash, WalletAddress, SUBSCRIPTION_PERIOD_SECS};

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

fn registered(creator: &WalletAddress, name: &str) -> ChainEvent {
    ChainEvent {
        meta: meta(0xA0, 10),
        body: EventBody::CreatorRegistered(CreatorRegistered {
            creator: creator.clone(),
            name: name.to_string(),
            timestamp: 1_700_000_000,
        }),
    }
}

fn received(payer: &WalletAddress, creator: &WalletAddress, amount: u64, tx_byte: u8) -> ChainEvent {
    ChainEvent {
        meta: meta(tx_byte, 11),
        body: EventBody::PaymentReceived(PaymentReceived {
            payer: payer.clone(),
            creator: creator.clone(),
            amount,
            kind: PaymentKind::Tip,
        }),
    }
}

fn completed(tx_byte: u8, creator: &WalletAddress, creator_amount: u64, fee: u64) -> ChainEvent {
    ChainEvent {
        meta: meta(0xF0, 12),
        body: EventBody::PaymentCompleted(PaymentCompleted {
            tx_id: TxHash::from_bytes(&[tx_byte; 32]),
            creator: creator.clone(),
            creator_amount,
            platform_fee: fee,
        }),
    }
}

fn projector() -> Projector {
    Projector::new(FeeSplit::default(), SUBSCRIPTION_PERIOD_SECS)
}

fn setup_with_parties(payer: &WalletAddress, creator: &WalletAddress) -> Connection {
    let mut conn = sienna_db::open_memory().expect("open");
    projector()
        .apply(&mut conn, &registered(creator, "Creator"), 1_000)
        .expect("register creator");
    queries::identities::insert_wallet(&conn, payer, "payer", Role::Fan, 100).expect("payer");
    conn
}

/// Full async path: events ride the bus into a running projector task.
#[tokio::test]
async fn payment_events_settle_exactly_once() {
    let payer = wallet(1);
    let creator = wallet(2);
    let conn = setup_with_parties(&payer, &creator);
    let db = Arc::new(Mutex::new(conn));

    let bus = EventBus::new(64);
    let events = bus.subscribe();
    let (shutdown_tx, _) = broadcast::channel(1);

    let handle = {
        let db = db.clone();
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            projector().run(db, events, shutdown).await;
        })
    };

    // Redelivered payment and completion: at-least-once delivery upstream.
    bus.publish(received(&payer, &creator, 1_000, 0xB1));
    bus.publish(received(&payer, &creator, 1_000, 0xB1));
    bus.publish(completed(0xB1, &creator, 900, 100));
    bus.publish(completed(0xB1, &creator, 900, 100));

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    shutdown_tx.send(()).expect("shutdown");
    handle.await.expect("projector task");

    let conn = db.lock().await;
    let payment = queries::payments::get(&conn, &TxHash::from_bytes(&[0xB1; 32]))
        .expect("query")
        .expect("one row");
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.total_amount, 1_000);
    assert_eq!(payment.platform_fee + payment.creator_amount, 1_000);

    // Earnings credited exactly once despite the duplicate completion.
    let profile = queries::creators::get(&conn, &creator)
        .expect("query")
        .expect("profile");
    assert_eq!(profile.total_earnings, payment.creator_amount);
}

#[test]
fn completion_without_payment_is_skipped() {
    let payer = wallet(3);
    let creator = wallet(4);
    let mut conn = setup_with_parties(&payer, &creator);

    projector()
        .apply(&mut conn, &completed(0xB2, &creator, 900, 100), 1_100)
        .expect("orphan completion is not an error");

    // Nothing was fabricated.
    assert!(queries::payments::get(&conn, &TxHash::from_bytes(&[0xB2; 32]))
        .expect("query")
        .is_none());
    assert_eq!(
        queries::creators::get(&conn, &creator)
            .expect("query")
            .expect("profile")
            .total_earnings,
        0
    );
}

#[test]
fn request_path_and_projector_agree_on_duplicates() {
    let payer = wallet(5);
    let creator = wallet(6);
    let mut conn = setup_with_parties(&payer, &creator);
    let payer_id = queries::identities::find_by_wallet(&conn, &payer)
        .expect("query")
        .expect("payer")
        .id;
    let tx_hash = TxHash::from_bytes(&[0xB3; 32]);
    let split = FeeSplit::default();

    // Request path records first.
    sienna_ledger::record(
        &conn,
        &split,
        &tx_hash,
        payer_id,
        &creator,
        PaymentKind::Tip,
        2_000,
        1_100,
    )
    .expect("record");

    // The projector sees the same transaction and swallows the duplicate.
    projector()
        .apply(&mut conn, &received(&payer, &creator, 2_000, 0xB3), 1_101)
        .expect("duplicate swallowed");

    // The request path trying again surfaces the conflict instead.
    let again = sienna_ledger::record(
        &conn,
        &split,
        &tx_hash,
        payer_id,
        &creator,
        PaymentKind::Tip,
        2_000,
        1_102,
    );
    assert!(matches!(again, Err(LedgerError::DuplicateTransaction)));
}

#[test]
fn refund_reverses_earnings_and_respects_guard() {
    let payer = wallet(7);
    let creator = wallet(8);
    let mut conn = setup_with_parties(&payer, &creator);
    let payer_id = queries::identities::find_by_wallet(&conn, &payer)
        .expect("query")
        .expect("payer")
        .id;
    let tx_hash = TxHash::from_bytes(&[0xB4; 32]);

    projector()
        .apply(&mut conn, &received(&payer, &creator, 1_000, 0xB4), 1_100)
        .expect("received");
    projector()
        .apply(&mut conn, &completed(0xB4, &creator, 900, 100), 1_200)
        .expect("completed");

    // A third party may not refund.
    let stranger = sienna_ledger::refund(&mut conn, &tx_hash, 9_999, None, 1_300);
    assert!(matches!(stranger, Err(LedgerError::Forbidden)));

    // The payer may; earnings return to zero.
    let refunded =
        sienna_ledger::refund(&mut conn, &tx_hash, payer_id, None, 1_301).expect("refund");
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(
        queries::creators::get(&conn, &creator)
            .expect("query")
            .expect("profile")
            .total_earnings,
        0
    );

    // Refunded is terminal.
    let again = sienna_ledger::refund(&mut conn, &tx_hash, payer_id, None, 1_302);
    assert!(matches!(
        again,
        Err(LedgerError::InvalidState(PaymentStatus::Refunded))
    ));
}
