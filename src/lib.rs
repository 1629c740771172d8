//! Client-side state synchronization for an on-chain custodial vault.
//!
//! Keeps a view of three balances (the connected wallet's native balance, its recorded vault
//! balance and the vault's total value locked) consistent with the chain, and runs deposits and
//! withdrawals against the vault one at a time.
//!
//! - `chain`: provider boundaries and the account/network connection.
//! - `rpc`: JSON-RPC transport over HTTP and WebSocket.
//! - `vault`: typed client for the vault contract.
//! - `sync`: the balance snapshot, the observable state and the coalescing refresh engine.
//! - `transaction`: amount validation and the single-flight write coordinator.
//! - `service`: wiring of all of the above.

pub mod chain;
pub mod config;
pub mod error;
pub mod rpc;
pub mod service;
pub mod sync;
pub mod transaction;
pub mod utils;
pub mod vault;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, VaultConfig};
pub use error::VaultError;
pub use service::{ServiceConfig, VaultSyncService};
