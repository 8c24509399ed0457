//! Configured/unconfigured chain access.
//!
//! A daemon can run without a provider URL; everything that does not touch
//! the chain still works. Request paths that need the chain go through
//! [`ChainHandle::client`] and surface [`crate::ChainError::Unconfigured`]
//! instead of panicking or hanging.

use std::sync::Arc;

use crate::client::ChainClient;
use crate::{ChainError, Result};

/// Shared handle to the chain client, or the explicit absence of one.
#[derive(Clone)]
pub enum ChainHandle {
    Configured(Arc<ChainClient>),
    Unconfigured,
}

impl ChainHandle {
    /// Build a handle from an optional provider URL.
    pub fn from_rpc_url(rpc_url: Option<&str>) -> Result<Self> {
        match rpc_url {
            Some(url) => Ok(Self::Configured(Arc::new(ChainClient::new(url)?))),
            None => Ok(Self::Unconfigured),
        }
    }

    /// The client, or `Unconfigured` if the daemon started without one.
    pub fn client(&self) -> Result<&Arc<ChainClient>> {
        match self {
            Self::Configured(client) => Ok(client),
            Self::Unconfigured => Err(ChainError::Unconfigured),
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_handle() {
        let handle = ChainHandle::from_rpc_url(None).expect("build handle");
        assert!(!handle.is_configured());
        assert!(matches!(
            handle.client().expect_err("no client"),
            ChainError::Unconfigured
        ));
    }

    #[test]
    fn test_configured_handle() {
        let handle =
            ChainHandle::from_rpc_url(Some("http://127.0.0.1:8545")).expect("build handle");
        assert!(handle.is_configured());
        assert!(handle.client().is_ok());
    }
}
