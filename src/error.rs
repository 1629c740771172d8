use crate::rpc::{RpcError, codes};
use crate::transaction::OperationKind;

use std::time::Duration;

/// Errors surfaced by the connection, the vault client and the transaction coordinator.
///
/// Display strings are what ends up in the status line, so they carry the best message the
/// wallet or node gave us.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
	#[error("No wallet available")]
	WalletUnavailable,

	#[error("Not connected")]
	NotConnected,

	#[error("User rejected the request: {0}")]
	UserRejected(String),

	#[error("Switch to chain {0} was rejected")]
	NetworkSwitchRejected(u64),

	#[error("Invalid amount: {0}")]
	InvalidAmount(String),

	#[error("Insufficient funds: {0}")]
	InsufficientFunds(String),

	#[error("Contract reverted: {0}")]
	ContractReverted(String),

	#[error("RPC error: {0}")]
	Rpc(String),

	#[error("{0} already in progress")]
	OperationInProgress(OperationKind),

	#[error("Timed out after {0:?} waiting for confirmation")]
	Timeout(Duration),
}

impl From<RpcError> for VaultError {
	/// Classify a transport error by JSON-RPC code and message.
	fn from(error: RpcError) -> Self {
		match &error {
			RpcError::Rpc { code, message } => {
				let lowered = message.to_lowercase();
				if *code == codes::USER_REJECTED {
					VaultError::UserRejected(message.clone())
				} else if lowered.contains("insufficient funds") {
					VaultError::InsufficientFunds(message.clone())
				} else if *code == codes::EXECUTION_REVERTED || lowered.contains("revert") {
					VaultError::ContractReverted(message.clone())
				} else {
					VaultError::Rpc(error.to_string())
				}
			}
			_ => VaultError::Rpc(error.to_string()),
		}
	}
}
