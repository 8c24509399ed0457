//! Creator profile records.

use serde::{Deserialize, Serialize};

use crate::address::WalletAddress;
use crate::{Amount, IdentityId};

/// Off-chain projection of a creator: registered on-chain (via the
/// `CreatorRegistered` event) or stubbed when a wallet requests a login
/// nonce with the creator role.
///
/// `total_earnings` and `subscriber_count` are derived aggregates. Only the
/// payment ledger and the subscription lifecycle mutate them; they are never
/// accepted from client input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatorProfile {
    pub wallet_address: WalletAddress,
    pub identity_id: IdentityId,
    pub display_name: String,
    pub subscription_price: Amount,
    pub total_earnings: Amount,
    pub subscriber_count: u64,
    pub verified: bool,
    /// Contract the registration event came from. None for off-chain stubs
    /// that have not been seen on-chain yet.
    pub contract_address: Option<WalletAddress>,
    /// Chain timestamp of the registration event, when known.
    pub registered_at: Option<u64>,
}
