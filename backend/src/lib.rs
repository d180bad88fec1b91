//! Lending core for a peer-to-peer borrowing marketplace.
//!
//! - [`domain`]: the item/transaction state machine, trust-based permission
//!   projection, and group moderation rules, plus the services that run them
//!   against the ports.
//! - [`outbound`]: adapters for those ports.
//! - [`config`]: settings loaded from the environment.

pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
