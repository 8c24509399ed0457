//! Subscription records.

use serde::{Deserialize, Serialize};

use crate::address::WalletAddress;
use crate::{Amount, IdentityId, TokenId};

/// A subscription, keyed by the on-chain membership token id.
///
/// Invariant: `expires_at >= started_at`. Renewal only ever moves
/// `expires_at` forward.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    pub token_id: TokenId,
    pub subscriber_id: IdentityId,
    pub creator_wallet: WalletAddress,
    pub price: Amount,
    pub started_at: u64,
    pub expires_at: u64,
    pub active: bool,
    pub auto_renew: bool,
    pub cancelled_at: Option<u64>,
}

impl Subscription {
    /// The access predicate. The stored flag alone is not enough: a row can
    /// be flagged active with an expiry already in the past between sweeps,
    /// so callers must evaluate both.
    pub fn is_effectively_active(&self, now: u64) -> bool {
        self.active && self.expires_at >= now
    }
}
