//! Single-flight coordinator for vault writes.
//!
//! Each operation runs the same sequence: validate the amount, claim the pending slot, submit
//! through the vault client bound to the current account, wait for confirmation, then surface
//! the outcome in the status line and release the slot. Only a confirmed write asks the sync
//! engine for a refresh; a failed one leaves the snapshot alone.

use crate::error::VaultError;
use crate::sync::{StateStore, StatusSource, SyncHandle};
use crate::transaction::{
	OperationKind, OperationReceipt, OperationStatus, PendingOperation, parse_amount,
};
use crate::utils::{Unit, format_units};
use crate::vault::{Confirmation, VaultClient};

use alloy_primitives::{B256, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Default time to wait for a submitted write to be included.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(180);

/// A validated write request
#[derive(Debug, Clone, Copy)]
enum WriteRequest {
	Deposit(U256),
	Withdraw(U256),
	WithdrawAll,
}

impl WriteRequest {
	fn kind(&self) -> OperationKind {
		match self {
			WriteRequest::Deposit(_) => OperationKind::Deposit,
			WriteRequest::Withdraw(_) => OperationKind::Withdraw,
			WriteRequest::WithdrawAll => OperationKind::WithdrawAll,
		}
	}

	fn amount(&self) -> Option<U256> {
		match self {
			WriteRequest::Deposit(amount) | WriteRequest::Withdraw(amount) => Some(*amount),
			WriteRequest::WithdrawAll => None,
		}
	}

	fn success_message(&self) -> String {
		match self {
			WriteRequest::Deposit(amount) => {
				format!("Deposited {} ETH", format_units(*amount, Unit::ETHER))
			}
			WriteRequest::Withdraw(amount) => {
				format!("Withdrew {} ETH", format_units(*amount, Unit::ETHER))
			}
			WriteRequest::WithdrawAll => "Withdrew all".to_string(),
		}
	}
}

/// Clears the pending slot if the operation future is dropped before it finished.
struct PendingSlot<'a> {
	store: &'a StateStore,
	armed: bool,
}

impl PendingSlot<'_> {
	fn release(mut self) {
		self.armed = false;
		self.store.clear_pending();
	}
}

impl Drop for PendingSlot<'_> {
	fn drop(&mut self) {
		if self.armed {
			self.store.update_pending(|pending| pending.status = OperationStatus::Failed);
			self.store.clear_pending();
		}
	}
}

#[derive(Clone)]
pub struct TransactionCoordinator {
	vault: watch::Receiver<Option<Arc<VaultClient>>>,
	sync: SyncHandle,
	store: StateStore,
	confirmation_timeout: Duration,
}

impl TransactionCoordinator {
	pub fn new(
		vault: watch::Receiver<Option<Arc<VaultClient>>>,
		sync: SyncHandle,
		store: StateStore,
	) -> Self {
		Self {
			vault,
			sync,
			store,
			confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
		}
	}

	pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
		self.confirmation_timeout = timeout;
		self
	}

	/// Deposit `amount` ether into the vault
	pub async fn deposit(&self, amount: &str) -> Result<OperationReceipt, VaultError> {
		let amount = parse_amount(amount)?;
		self.execute(WriteRequest::Deposit(amount)).await
	}

	/// Withdraw `amount` ether from the vault
	pub async fn withdraw(&self, amount: &str) -> Result<OperationReceipt, VaultError> {
		let amount = parse_amount(amount)?;
		self.execute(WriteRequest::Withdraw(amount)).await
	}

	/// Withdraw the whole recorded vault balance
	pub async fn withdraw_all(&self) -> Result<OperationReceipt, VaultError> {
		self.execute(WriteRequest::WithdrawAll).await
	}

	async fn execute(&self, request: WriteRequest) -> Result<OperationReceipt, VaultError> {
		let kind = request.kind();
		let vault = self.vault.borrow().clone().ok_or(VaultError::NotConnected)?;

		self.store
			.try_begin_operation(PendingOperation::new(kind, request.amount()))?;
		let slot = PendingSlot {
			store: &self.store,
			armed: true,
		};
		self.store
			.set_status(kind.progress_message(), StatusSource::Transaction);
		info!("{} started", kind);

		let submitted = match request {
			WriteRequest::Deposit(amount) => vault.deposit(amount).await,
			WriteRequest::Withdraw(amount) => vault.withdraw(amount).await,
			WriteRequest::WithdrawAll => vault.withdraw_all().await,
		};
		let submission = match submitted {
			Ok(hash) => hash,
			Err(e) => return Err(self.fail(slot, kind, e)),
		};
		self.store
			.update_pending(|pending| pending.submission = Some(submission));

		let block_number = match vault
			.await_confirmation(submission, self.confirmation_timeout)
			.await
		{
			Ok(Confirmation::Confirmed { block_number }) => block_number,
			Ok(Confirmation::Reverted { .. }) => {
				return Err(self.fail(slot, kind, reverted(submission)));
			}
			Err(e) => return Err(self.fail(slot, kind, e)),
		};

		self.store
			.update_pending(|pending| pending.status = OperationStatus::Confirmed);
		self.store
			.set_status(request.success_message(), StatusSource::Transaction);
		info!("{} confirmed in {}", kind, submission);
		self.sync.notify_transaction_completed(submission);
		slot.release();

		Ok(OperationReceipt {
			kind,
			amount: request.amount(),
			submission,
			block_number,
		})
	}

	/// Surface a failure verbatim and release the slot.
	fn fail(&self, slot: PendingSlot<'_>, kind: OperationKind, error: VaultError) -> VaultError {
		error!("{} failed: {}", kind, error);
		self.store
			.update_pending(|pending| pending.status = OperationStatus::Failed);
		self.store
			.set_status(error.to_string(), StatusSource::Transaction);
		slot.release();
		error
	}
}

fn reverted(submission: B256) -> VaultError {
	VaultError::ContractReverted(format!("transaction {} was reverted", submission))
}
