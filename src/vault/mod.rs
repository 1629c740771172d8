//! Vault contract surface
//!
//! Typed access to the vault's four calls (`balanceOf`, `deposit`, `withdraw`, `withdrawAll`)
//! and its two events (`Deposited`, `Withdrew`).

/// Contract bindings for calls and events
pub mod abi;
/// Contract client bound to one signer
pub mod client;
mod types;

pub use client::VaultClient;
pub use types::*;
