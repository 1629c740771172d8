//! Typed client for the vault contract.
//!
//! A `VaultClient` is bound to one signer account. Reads go through the chain provider, writes
//! are signed and broadcast by the wallet provider, and confirmation is observed by polling the
//! receipt until the caller's timeout runs out.

use crate::chain::{ChainProvider, SubscriptionGuard, WalletProvider, spawn_resubscribing};
use crate::error::VaultError;
use crate::rpc::{Log, LogFilter, TransactionRequest};
use crate::vault::{Confirmation, VaultEventKind, abi};

use alloy_primitives::{Address, B256, Bytes, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default spacing between receipt polls.
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct VaultClient {
	chain: Arc<dyn ChainProvider>,
	signer: Arc<dyn WalletProvider>,
	/// The vault contract.
	address: Address,
	/// Account the signer sends from.
	account: Address,
	receipt_poll_interval: Duration,
}

impl VaultClient {
	pub fn new(
		chain: Arc<dyn ChainProvider>,
		signer: Arc<dyn WalletProvider>,
		address: Address,
		account: Address,
	) -> Self {
		Self {
			chain,
			signer,
			address,
			account,
			receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
		}
	}

	pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
		self.receipt_poll_interval = interval;
		self
	}

	/// Address of the vault contract
	pub fn address(&self) -> Address {
		self.address
	}

	/// Account this client signs for
	pub fn account(&self) -> Address {
		self.account
	}

	/// Recorded vault balance of `owner`
	pub async fn balance_of(&self, owner: Address) -> Result<U256, VaultError> {
		let request = TransactionRequest {
			to: self.address,
			data: Some(abi::encode_balance_of(owner)),
			..Default::default()
		};
		let data = self.chain.call(&request).await?;
		abi::decode_balance_of(&data)
	}

	/// Send `amount` wei into the vault
	pub async fn deposit(&self, amount: U256) -> Result<B256, VaultError> {
		ensure_positive(amount)?;
		self.send(abi::encode_deposit(), Some(amount)).await
	}

	/// Withdraw `amount` wei of the recorded balance
	pub async fn withdraw(&self, amount: U256) -> Result<B256, VaultError> {
		ensure_positive(amount)?;
		self.send(abi::encode_withdraw(amount), None).await
	}

	/// Withdraw the whole recorded balance
	pub async fn withdraw_all(&self) -> Result<B256, VaultError> {
		self.send(abi::encode_withdraw_all(), None).await
	}

	async fn send(&self, data: Bytes, value: Option<U256>) -> Result<B256, VaultError> {
		let request = TransactionRequest {
			from: Some(self.account),
			to: self.address,
			value,
			data: Some(data),
		};
		let hash = self.signer.send_transaction(request).await?;
		info!("Submitted transaction {} from {}", hash, self.account);
		Ok(hash)
	}

	/// Wait until `hash` is included, giving up after `timeout`.
	pub async fn await_confirmation(
		&self,
		hash: B256,
		timeout: Duration,
	) -> Result<Confirmation, VaultError> {
		tokio::time::timeout(timeout, self.poll_receipt(hash))
			.await
			.map_err(|_| VaultError::Timeout(timeout))?
	}

	async fn poll_receipt(&self, hash: B256) -> Result<Confirmation, VaultError> {
		let mut ticker = tokio::time::interval(self.receipt_poll_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			ticker.tick().await;
			let receipt = self
				.chain
				.get_transaction_receipt(hash)
				.await
				.map_err(|e| VaultError::Rpc(e.to_string()))?;

			let Some(receipt) = receipt else {
				debug!("Transaction {} still pending", hash);
				continue;
			};

			let block_number = receipt.block_number();
			return Ok(if receipt.succeeded() {
				info!("Transaction {} confirmed in block {:?}", hash, block_number);
				Confirmation::Confirmed { block_number }
			} else {
				warn!("Transaction {} reverted in block {:?}", hash, block_number);
				Confirmation::Reverted { block_number }
			});
		}
	}

	/// Run `handler` with (depositor, amount) for every `Deposited` event.
	pub fn on_deposited<F>(&self, handler: F) -> SubscriptionGuard
	where
		F: Fn(Address, U256) + Send + Sync + 'static,
	{
		self.on_event(VaultEventKind::Deposited, handler)
	}

	/// Run `handler` with (depositor, amount) for every `Withdrew` event.
	pub fn on_withdrew<F>(&self, handler: F) -> SubscriptionGuard
	where
		F: Fn(Address, U256) + Send + Sync + 'static,
	{
		self.on_event(VaultEventKind::Withdrew, handler)
	}

	fn on_event<F>(&self, kind: VaultEventKind, handler: F) -> SubscriptionGuard
	where
		F: Fn(Address, U256) + Send + Sync + 'static,
	{
		let chain = Arc::clone(&self.chain);
		let filter = LogFilter {
			address: self.address,
			topics: vec![vec![kind.topic()]],
		};

		spawn_resubscribing(
			kind.subscription_name(),
			move || {
				let chain = Arc::clone(&chain);
				let filter = filter.clone();
				async move { chain.subscribe_logs(filter).await }
			},
			move |log: Log| {
				if log.removed {
					debug!("Ignoring removed vault log");
					return;
				}
				match abi::decode_event(&log) {
					Some(event) if event.kind() == kind => handler(event.depositor(), event.amount()),
					Some(_) => {}
					None => warn!("Ignoring undecodable vault log: {:?}", log.topics),
				}
			},
		)
	}
}

fn ensure_positive(amount: U256) -> Result<(), VaultError> {
	if amount.is_zero() {
		return Err(VaultError::InvalidAmount(
			"amount must be greater than zero".to_string(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{MockChain, ether};

	fn client(mock: &Arc<MockChain>) -> VaultClient {
		VaultClient::new(mock.clone(), mock.clone(), mock.vault(), mock.account())
			.with_receipt_poll_interval(Duration::from_millis(5))
	}

	#[tokio::test]
	async fn deposit_then_balance_of() {
		let mock = MockChain::new();
		let client = client(&mock);

		let hash = client.deposit(ether("1")).await.unwrap();
		assert_eq!(
			client.await_confirmation(hash, Duration::from_secs(1)).await,
			Ok(Confirmation::Confirmed {
				block_number: Some(1)
			})
		);
		assert_eq!(client.balance_of(mock.account()).await, Ok(ether("1")));
	}

	#[tokio::test]
	async fn zero_amounts_never_reach_the_wallet() {
		let mock = MockChain::new();
		let client = client(&mock);
		assert!(matches!(
			client.deposit(U256::ZERO).await,
			Err(VaultError::InvalidAmount(_))
		));
		assert!(matches!(
			client.withdraw(U256::ZERO).await,
			Err(VaultError::InvalidAmount(_))
		));
		assert_eq!(mock.sent_transactions(), 0);
	}

	#[tokio::test]
	async fn overdrawn_withdraw_reverts() {
		let mock = MockChain::new();
		let client = client(&mock);
		let hash = client.withdraw(ether("1")).await.unwrap();
		assert!(matches!(
			client.await_confirmation(hash, Duration::from_secs(1)).await,
			Ok(Confirmation::Reverted { .. })
		));
	}

	#[tokio::test]
	async fn wallet_errors_are_classified() {
		let mock = MockChain::new();
		let client = client(&mock);

		mock.reject_signatures(true);
		assert!(matches!(
			client.withdraw_all().await,
			Err(VaultError::UserRejected(_))
		));

		mock.reject_signatures(false);
		assert!(matches!(
			client.deposit(ether("1000000")).await,
			Err(VaultError::InsufficientFunds(_))
		));
	}

	#[tokio::test]
	async fn confirmation_wait_times_out() {
		let mock = MockChain::new();
		mock.hold_receipts(true);
		let client = client(&mock);
		let hash = client.deposit(ether("1")).await.unwrap();
		assert_eq!(
			client
				.await_confirmation(hash, Duration::from_millis(50))
				.await,
			Err(VaultError::Timeout(Duration::from_millis(50)))
		);
	}

	#[tokio::test]
	async fn balance_of_surfaces_transport_errors() {
		let mock = MockChain::new();
		mock.fail_vault_calls(true);
		let client = client(&mock);
		assert!(matches!(
			client.balance_of(mock.account()).await,
			Err(VaultError::Rpc(_))
		));
	}

	#[tokio::test]
	async fn event_handlers_see_every_depositor() {
		let mock = MockChain::new();
		let client = client(&mock);
		let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
		let _deposits = client.on_deposited(move |depositor, amount| {
			let _ = tx.send((depositor, amount));
		});
		mock.wait_for_log_subscribers(1).await;

		let stranger = Address::repeat_byte(0x77);
		mock.external_deposit(stranger, ether("2"));
		assert_eq!(rx.recv().await, Some((stranger, ether("2"))));
	}

	#[tokio::test]
	async fn unsubscribed_handlers_stop_firing() {
		let mock = MockChain::new();
		let client = client(&mock);
		let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(Address, U256)>();
		let withdrawals = client.on_withdrew(move |depositor, amount| {
			let _ = tx.send((depositor, amount));
		});
		mock.wait_for_log_subscribers(1).await;

		withdrawals.unsubscribe();
		assert_eq!(rx.recv().await, None);
	}
}
