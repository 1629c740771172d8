use crate::vault::abi;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolEvent;

/// Activity reported by the vault contract, for any depositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultEvent {
	Deposited { depositor: Address, amount: U256 },
	Withdrew { depositor: Address, amount: U256 },
}

impl VaultEvent {
	pub fn kind(&self) -> VaultEventKind {
		match self {
			VaultEvent::Deposited { .. } => VaultEventKind::Deposited,
			VaultEvent::Withdrew { .. } => VaultEventKind::Withdrew,
		}
	}

	pub fn depositor(&self) -> Address {
		match self {
			VaultEvent::Deposited { depositor, .. } | VaultEvent::Withdrew { depositor, .. } => {
				*depositor
			}
		}
	}

	pub fn amount(&self) -> U256 {
		match self {
			VaultEvent::Deposited { amount, .. } | VaultEvent::Withdrew { amount, .. } => *amount,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VaultEventKind {
	Deposited,
	Withdrew,
}

impl VaultEventKind {
	pub fn topic(&self) -> B256 {
		match self {
			VaultEventKind::Deposited => abi::Deposited::SIGNATURE_HASH,
			VaultEventKind::Withdrew => abi::Withdrew::SIGNATURE_HASH,
		}
	}

	pub(crate) fn subscription_name(&self) -> &'static str {
		match self {
			VaultEventKind::Deposited => "vault-deposited",
			VaultEventKind::Withdrew => "vault-withdrew",
		}
	}
}

/// Outcome of waiting for a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
	/// Included and executed successfully.
	Confirmed { block_number: Option<u64> },
	/// Included, but execution reverted.
	Reverted { block_number: Option<u64> },
}
