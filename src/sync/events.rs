//! Trigger types for the sync engine.
//!
//! Every source of change (the user, new blocks, vault events, the wallet, local transactions)
//! is reduced to a `SyncTrigger` and delivered over one channel. The engine treats all of them
//! the same way; the kind is kept for logging and statistics only. Ordering across sources is
//! not guaranteed.

use crate::rpc::BlockHeader;

use alloy_primitives::{Address, B256, U256};
use std::fmt;

/// A reason to refresh the balances
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTrigger {
	/// Explicit refresh request
	Manual,
	/// A new block was announced
	NewBlock { number: u64 },
	/// Someone deposited into the vault
	Deposited { depositor: Address, amount: U256 },
	/// Someone withdrew from the vault
	Withdrew { depositor: Address, amount: U256 },
	/// The connected account or network was established or replaced
	AccountOrNetworkChanged,
	/// A locally submitted transaction was confirmed
	TransactionCompleted { submission: B256 },
}

impl SyncTrigger {
	pub fn kind(&self) -> TriggerKind {
		match self {
			SyncTrigger::Manual => TriggerKind::Manual,
			SyncTrigger::NewBlock { .. } => TriggerKind::NewBlock,
			SyncTrigger::Deposited { .. } => TriggerKind::Deposited,
			SyncTrigger::Withdrew { .. } => TriggerKind::Withdrew,
			SyncTrigger::AccountOrNetworkChanged => TriggerKind::AccountOrNetworkChanged,
			SyncTrigger::TransactionCompleted { .. } => TriggerKind::TransactionCompleted,
		}
	}
}

impl fmt::Display for SyncTrigger {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncTrigger::Manual => write!(f, "manual refresh"),
			SyncTrigger::NewBlock { number } => write!(f, "block {}", number),
			SyncTrigger::Deposited { depositor, amount } => {
				write!(f, "deposit of {} wei by {}", amount, depositor)
			}
			SyncTrigger::Withdrew { depositor, amount } => {
				write!(f, "withdrawal of {} wei by {}", amount, depositor)
			}
			SyncTrigger::AccountOrNetworkChanged => write!(f, "account or network change"),
			SyncTrigger::TransactionCompleted { submission } => {
				write!(f, "confirmation of {}", submission)
			}
		}
	}
}

impl From<&BlockHeader> for SyncTrigger {
	fn from(header: &BlockHeader) -> Self {
		SyncTrigger::NewBlock {
			number: header.number.to::<u64>(),
		}
	}
}

/// Trigger origin, for statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TriggerKind {
	Manual,
	NewBlock,
	Deposited,
	Withdrew,
	AccountOrNetworkChanged,
	TransactionCompleted,
}

/// Messages accepted by the engine task
#[derive(Debug)]
pub(crate) enum SyncCommand {
	Trigger(SyncTrigger),
	Shutdown,
}
