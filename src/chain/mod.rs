//! Chain connection module
//!
//! This module owns everything that sits between the vault logic and the outside world:
//!
//! - `provider`: the `ChainProvider` (reads, subscriptions) and `WalletProvider` (accounts,
//!   network switching, signing) boundaries.
//! - `connection`: `ChainConnection`, which establishes the account identity and relays
//!   out-of-band account or network changes.
//! - `node_wallet`: a `WalletProvider` backed by a node's unlocked accounts.
//! - `subscription`: scoped listener handles and the resubscribing stream helper.

/// Account identity establishment and change relay
pub mod connection;
/// Wallet provider backed by node-managed accounts
pub mod node_wallet;
/// Provider traits
pub mod provider;
/// Scoped subscription handles
pub mod subscription;
mod types;

pub use connection::{ChainConnection, ChangeHandler};
pub use node_wallet::NodeWallet;
pub use provider::*;
pub use subscription::{SubscriptionGuard, spawn_resubscribing};
pub use types::*;
