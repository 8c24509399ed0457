//! Identity records and roles.

use serde::{Deserialize, Serialize};

use crate::address::WalletAddress;
use crate::IdentityId;

/// Platform role attached to an identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Fan,
    Creator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Fan => "fan",
            Role::Creator => "creator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fan" => Some(Role::Fan),
            "creator" => Some(Role::Creator),
            _ => None,
        }
    }
}

/// A platform identity. Created lazily on first nonce request for a wallet,
/// or explicitly through email registration. Never hard-deleted; `active`
/// goes false on deactivation and every auth path refuses inactive rows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub wallet_address: Option<WalletAddress>,
    pub handle: String,
    pub email: Option<String>,
    pub role: Role,
    pub active: bool,
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::parse("fan"), Some(Role::Fan));
        assert_eq!(Role::parse("creator"), Some(Role::Creator));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::Creator.as_str(), "creator");
    }

    #[test]
    fn test_role_serde_snake_case() {
        let json = serde_json::to_string(&Role::Creator).expect("serialize");
        assert_eq!(json, "\"creator\"");
    }
}
