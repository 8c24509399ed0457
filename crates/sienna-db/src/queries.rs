//! Database query functions organized by domain.

pub mod creators;
pub mod identities;
pub mod nonces;
pub mod payments;
pub mod sessions;
pub mod settings;
pub mod subscriptions;
