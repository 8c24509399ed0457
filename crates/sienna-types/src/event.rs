//! Decoded contract events.
//!
//! These are the logical payloads carried by the platform contracts' logs,
//! after ABI decoding. Delivery is at-least-once and unordered; consumers
//! must key every effect on the natural identifiers carried here.

use serde::{Deserialize, Serialize};

use crate::address::{TxHash, WalletAddress};
use crate::payment::PaymentKind;
use crate::{Amount, TokenId};

/// Log envelope common to every decoded event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Hash of the transaction that emitted the log.
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Contract the log came from.
    pub contract: WalletAddress,
}

/// A creator registered on the registry contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorRegistered {
    pub creator: WalletAddress,
    pub name: String,
    pub timestamp: u64,
}

/// The platform marked a creator as verified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorVerified {
    pub creator: WalletAddress,
    pub timestamp: u64,
}

/// The escrow contract accepted a payment. The payment's identity is the
/// emitting transaction's hash, carried in [`EventMeta`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceived {
    pub payer: WalletAddress,
    pub creator: WalletAddress,
    pub amount: Amount,
    pub kind: PaymentKind,
}

/// The escrow contract released a payment to its creator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCompleted {
    /// Hash of the original payment transaction, not of the release.
    pub tx_id: TxHash,
    pub creator: WalletAddress,
    pub creator_amount: Amount,
    pub platform_fee: Amount,
}

/// A membership token was minted on the subscription registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscribed {
    pub token_id: TokenId,
    pub subscriber: WalletAddress,
    pub creator: WalletAddress,
    pub price: Amount,
    /// Authoritative expiry chosen by the contract.
    pub end_time: u64,
}

/// A membership token was cancelled on-chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCancelled {
    pub token_id: TokenId,
    pub subscriber: WalletAddress,
    pub timestamp: u64,
}

/// Decoded event payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event", content = "data")]
pub enum EventBody {
    CreatorRegistered(CreatorRegistered),
    CreatorVerified(CreatorVerified),
    PaymentReceived(PaymentReceived),
    PaymentCompleted(PaymentCompleted),
    Subscribed(Subscribed),
    SubscriptionCancelled(SubscriptionCancelled),
}

/// A decoded contract event with its log envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub meta: EventMeta,
    pub body: EventBody,
}

impl ChainEvent {
    /// Stable name for logs and counters.
    pub fn name(&self) -> &'static str {
        match self.body {
            EventBody::CreatorRegistered(_) => "creator_registered",
            EventBody::CreatorVerified(_) => "creator_verified",
            EventBody::PaymentReceived(_) => "payment_received",
            EventBody::PaymentCompleted(_) => "payment_completed",
            EventBody::Subscribed(_) => "subscribed",
            EventBody::SubscriptionCancelled(_) => "subscription_cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let ev = ChainEvent {
            meta: EventMeta {
                tx_hash: TxHash::from_bytes(&[0xaa; 32]),
                block_number: 42,
                contract: WalletAddress::from_bytes(&[1u8; 20]),
            },
            body: EventBody::CreatorVerified(CreatorVerified {
                creator: WalletAddress::from_bytes(&[2u8; 20]),
                timestamp: 1_700_000_000,
            }),
        };
        let json = serde_json::to_value(&ev).expect("serialize");
        assert_eq!(json["body"]["event"], "creator_verified");
        assert_eq!(json["meta"]["block_number"], 42);
        let back: ChainEvent = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, ev);
        assert_eq!(back.name(), "creator_verified");
    }
}
