//! Fixed-ABI log decoder for the six platform contract events.
//!
//! Three contracts emit them: the creator registry, the payment escrow, and
//! the subscription registry. Indexed parameters arrive as topics, the rest
//! as 32-byte data words, with one dynamic `string` (the creator name) laid
//! out as offset / length / padded bytes.
//!
//! Event signatures:
//!
//! - `CreatorRegistered(address indexed creator, string name, uint256 timestamp)`
//! - `CreatorVerified(address indexed creator, uint256 timestamp)`
//! - `PaymentReceived(address indexed payer, address indexed creator, uint256 amount, uint8 kind)`
//! - `PaymentCompleted(bytes32 indexed txId, address indexed creator, uint256 creatorAmount, uint256 platformFee)`
//! - `Subscribed(uint256 indexed tokenId, address indexed subscriber, address indexed creator, uint256 price, uint256 endTime)`
//! - `SubscriptionCancelled(uint256 indexed tokenId, address indexed subscriber, uint256 timestamp)`

use std::sync::OnceLock;

use sienna_crypto::hash::keccak256;
use sienna_types::event::{
    ChainEvent, CreatorRegistered, CreatorVerified, EventBody, EventMeta, PaymentCompleted,
    PaymentReceived, Subscribed, SubscriptionCancelled,
};
use sienna_types::payment::PaymentKind;
use sienna_types::{TxHash, WalletAddress};

use crate::client::RawLog;
use crate::{ChainError, Result};

struct Topics {
    creator_registered: [u8; 32],
    creator_verified: [u8; 32],
    payment_received: [u8; 32],
    payment_completed: [u8; 32],
    subscribed: [u8; 32],
    subscription_cancelled: [u8; 32],
}

fn topics() -> &'static Topics {
    static TOPICS: OnceLock<Topics> = OnceLock::new();
    TOPICS.get_or_init(|| Topics {
        creator_registered: keccak256(b"CreatorRegistered(address,string,uint256)"),
        creator_verified: keccak256(b"CreatorVerified(address,uint256)"),
        payment_received: keccak256(b"PaymentReceived(address,address,uint256,uint8)"),
        payment_completed: keccak256(b"PaymentCompleted(bytes32,address,uint256,uint256)"),
        subscribed: keccak256(b"Subscribed(uint256,address,address,uint256,uint256)"),
        subscription_cancelled: keccak256(b"SubscriptionCancelled(uint256,address,uint256)"),
    })
}

/// All six topic0 values, for provider-side log filtering.
pub fn event_topic0s() -> Vec<[u8; 32]> {
    let t = topics();
    vec![
        t.creator_registered,
        t.creator_verified,
        t.payment_received,
        t.payment_completed,
        t.subscribed,
        t.subscription_cancelled,
    ]
}

/// Decode a raw log into a [`ChainEvent`].
///
/// Unknown topic0 values decode to `None` (a contract may emit events the
/// projection does not consume). Malformed data for a known topic0 is an
/// error; the event source logs and skips it without stopping the stream.
pub fn decode(log: &RawLog) -> Result<Option<ChainEvent>> {
    let Some(topic0) = log.topics.first() else {
        return Err(ChainError::Parse("log has no topics".into()));
    };
    let t = topics();

    let meta = EventMeta {
        tx_hash: log.tx_hash.clone(),
        block_number: log.block_number,
        contract: log.address.clone(),
    };

    let body = if *topic0 == t.creator_registered {
        EventBody::CreatorRegistered(CreatorRegistered {
            creator: topic_address(log, 1)?,
            name: dynamic_string(&log.data, 0)?,
            timestamp: data_u64(&log.data, 1)?,
        })
    } else if *topic0 == t.creator_verified {
        EventBody::CreatorVerified(CreatorVerified {
            creator: topic_address(log, 1)?,
            timestamp: data_u64(&log.data, 0)?,
        })
    } else if *topic0 == t.payment_received {
        let kind_code = data_u64(&log.data, 1)?;
        let kind = u8::try_from(kind_code)
            .ok()
            .and_then(PaymentKind::from_wire)
            .ok_or_else(|| ChainError::Parse(format!("unknown payment kind {kind_code}")))?;
        EventBody::PaymentReceived(PaymentReceived {
            payer: topic_address(log, 1)?,
            creator: topic_address(log, 2)?,
            amount: data_u64(&log.data, 0)?,
            kind,
        })
    } else if *topic0 == t.payment_completed {
        EventBody::PaymentCompleted(PaymentCompleted {
            tx_id: TxHash::from_bytes(topic(log, 1)?),
            creator: topic_address(log, 2)?,
            creator_amount: data_u64(&log.data, 0)?,
            platform_fee: data_u64(&log.data, 1)?,
        })
    } else if *topic0 == t.subscribed {
        EventBody::Subscribed(Subscribed {
            token_id: word_u64(topic(log, 1)?)?,
            subscriber: topic_address(log, 2)?,
            creator: topic_address(log, 3)?,
            price: data_u64(&log.data, 0)?,
            end_time: data_u64(&log.data, 1)?,
        })
    } else if *topic0 == t.subscription_cancelled {
        EventBody::SubscriptionCancelled(SubscriptionCancelled {
            token_id: word_u64(topic(log, 1)?)?,
            subscriber: topic_address(log, 2)?,
            timestamp: data_u64(&log.data, 0)?,
        })
    } else {
        return Ok(None);
    };

    Ok(Some(ChainEvent { meta, body }))
}

fn topic(log: &RawLog, index: usize) -> Result<&[u8; 32]> {
    log.topics
        .get(index)
        .ok_or_else(|| ChainError::Parse(format!("log missing topic {index}")))
}

fn topic_address(log: &RawLog, index: usize) -> Result<WalletAddress> {
    word_address(topic(log, index)?)
}

/// An address padded into a 32-byte word: 12 zero bytes then 20 address
/// bytes. Nonzero padding means the word is not an address.
fn word_address(word: &[u8; 32]) -> Result<WalletAddress> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(ChainError::Parse("address word has nonzero padding".into()));
    }
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[12..]);
    Ok(WalletAddress::from_bytes(&bytes))
}

/// A uint256 word that must fit in u64. Amounts, token ids, and timestamps
/// on this platform all do; anything wider is rejected rather than
/// truncated.
fn word_u64(word: &[u8; 32]) -> Result<u64> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(ChainError::Parse("uint256 does not fit in u64".into()));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(bytes))
}

fn data_word(data: &[u8], index: usize) -> Result<&[u8]> {
    let start = index * 32;
    data.get(start..start + 32)
        .ok_or_else(|| ChainError::Parse(format!("log data missing word {index}")))
}

fn data_u64(data: &[u8], index: usize) -> Result<u64> {
    let mut word = [0u8; 32];
    word.copy_from_slice(data_word(data, index)?);
    word_u64(&word)
}

/// Decode a dynamic `string` whose offset word sits at `offset_index`.
fn dynamic_string(data: &[u8], offset_index: usize) -> Result<String> {
    let offset = data_u64(data, offset_index)? as usize;
    if offset % 32 != 0 || offset + 32 > data.len() {
        return Err(ChainError::Parse(format!("bad string offset {offset}")));
    }
    let len = data_u64(data, offset / 32)? as usize;
    let start = offset + 32;
    let bytes = data
        .get(start..start + len)
        .ok_or_else(|| ChainError::Parse("string extends past log data".into()))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ChainError::Parse(format!("string is not utf-8: {e}")))
}
