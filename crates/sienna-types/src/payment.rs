//! Payment records and their status machine.

use serde::{Deserialize, Serialize};

use crate::address::{TxHash, WalletAddress};
use crate::{Amount, IdentityId};

/// What a payment was for. Carried as a uint8 in the escrow contract's
/// `PaymentReceived` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Subscription,
    Tip,
    ContentPurchase,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Subscription => "subscription",
            PaymentKind::Tip => "tip",
            PaymentKind::ContentPurchase => "content_purchase",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subscription" => Some(PaymentKind::Subscription),
            "tip" => Some(PaymentKind::Tip),
            "content_purchase" => Some(PaymentKind::ContentPurchase),
            _ => None,
        }
    }

    /// Wire code used by the escrow contract.
    pub fn from_wire(code: u8) -> Option<Self> {
        match code {
            0 => Some(PaymentKind::Subscription),
            1 => Some(PaymentKind::Tip),
            2 => Some(PaymentKind::ContentPurchase),
            _ => None,
        }
    }
}

/// Payment status. Transitions are monotonic: processing -> completed ->
/// refunded, or processing -> failed. Nothing ever moves backwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Processing,
    Completed,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(PaymentStatus::Processing),
            "completed" => Some(PaymentStatus::Completed),
            "refunded" => Some(PaymentStatus::Refunded),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// A recorded payment, keyed by the on-chain transaction hash.
///
/// Invariant: `platform_fee + creator_amount == total_amount` for every row,
/// in every status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub tx_hash: TxHash,
    pub payer_id: IdentityId,
    pub creator_wallet: WalletAddress,
    pub total_amount: Amount,
    pub platform_fee: Amount,
    pub creator_amount: Amount,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub created_at: u64,
    pub updated_at: u64,
}
