use alloy_primitives::{B256, U256};
use chrono::{DateTime, Utc};
use std::fmt;

/// The three user-initiated writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
	Deposit,
	Withdraw,
	WithdrawAll,
}

impl OperationKind {
	/// Status line shown while the operation is in flight
	pub fn progress_message(&self) -> &'static str {
		match self {
			OperationKind::Deposit => "Depositing...",
			OperationKind::Withdraw => "Withdrawing...",
			OperationKind::WithdrawAll => "Withdrawing all...",
		}
	}
}

impl fmt::Display for OperationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OperationKind::Deposit => write!(f, "Deposit"),
			OperationKind::Withdraw => write!(f, "Withdraw"),
			OperationKind::WithdrawAll => write!(f, "Withdraw all"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
	Submitted,
	Confirmed,
	Failed,
}

/// The single write currently in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
	pub kind: OperationKind,
	/// Requested amount in wei; `None` for withdraw-all.
	pub amount: Option<U256>,
	/// Transaction hash, once the network accepted the request.
	pub submission: Option<B256>,
	pub status: OperationStatus,
	pub started_at: DateTime<Utc>,
}

impl PendingOperation {
	pub fn new(kind: OperationKind, amount: Option<U256>) -> Self {
		Self {
			kind,
			amount,
			submission: None,
			status: OperationStatus::Submitted,
			started_at: Utc::now(),
		}
	}
}

/// What a confirmed operation reports back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationReceipt {
	pub kind: OperationKind,
	pub amount: Option<U256>,
	pub submission: B256,
	pub block_number: Option<u64>,
}
