//! Link between the wallet, the node and the required network.
//!
//! `ChainConnection` owns the provider pair and the current `AccountIdentity`. The identity is
//! held in a watch channel: `connect` swaps in the new value in one step and every receiver
//! (the sync engine in particular) observes it as the connection-established signal.

use crate::chain::{
	AccountIdentity, ChainProvider, HandlerId, SubscriptionGuard, WalletEvent, WalletProvider,
};
use crate::error::VaultError;
use crate::rpc::codes;

use alloy_primitives::{Address, U256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Callback run after an out-of-band account or network change has been applied.
///
/// Receives the new identity, or the reason the reconnect failed and the identity was cleared.
pub type ChangeHandler = Arc<dyn Fn(Result<&AccountIdentity, &VaultError>) + Send + Sync>;

pub struct ChainConnection {
	chain: Arc<dyn ChainProvider>,
	wallet: Option<Arc<dyn WalletProvider>>,
	required_chain_id: u64,
	identity: watch::Sender<Option<AccountIdentity>>,
	handlers: Mutex<BTreeMap<HandlerId, ChangeHandler>>,
	next_handler_id: AtomicU64,
}

impl ChainConnection {
	/// Create a connection. `wallet` is `None` when no wallet was injected.
	pub fn new(
		chain: Arc<dyn ChainProvider>,
		wallet: Option<Arc<dyn WalletProvider>>,
		required_chain_id: u64,
	) -> Self {
		let (identity, _) = watch::channel(None);
		Self {
			chain,
			wallet,
			required_chain_id,
			identity,
			handlers: Mutex::new(BTreeMap::new()),
			next_handler_id: AtomicU64::new(0),
		}
	}

	pub fn chain(&self) -> Arc<dyn ChainProvider> {
		Arc::clone(&self.chain)
	}

	pub fn wallet(&self) -> Option<Arc<dyn WalletProvider>> {
		self.wallet.clone()
	}

	pub fn required_chain_id(&self) -> u64 {
		self.required_chain_id
	}

	/// Request account access and make sure the wallet is on the required network.
	///
	/// On success the new identity replaces the previous one atomically.
	pub async fn connect(&self) -> Result<AccountIdentity, VaultError> {
		let wallet = self.wallet.as_ref().ok_or(VaultError::WalletUnavailable)?;

		let accounts = wallet.request_accounts().await?;
		let address = accounts
			.first()
			.copied()
			.ok_or_else(|| VaultError::UserRejected("no account was authorized".to_string()))?;

		let mut chain_id = wallet.chain_id().await?;
		if chain_id != self.required_chain_id {
			info!(
				"Wallet is on chain {}, requesting switch to {}",
				chain_id, self.required_chain_id
			);
			wallet
				.switch_chain(self.required_chain_id)
				.await
				.map_err(|e| match e.code() {
					Some(codes::USER_REJECTED) | Some(codes::UNRECOGNIZED_CHAIN) => {
						VaultError::NetworkSwitchRejected(self.required_chain_id)
					}
					_ => VaultError::from(e),
				})?;
			chain_id = wallet.chain_id().await?;
			if chain_id != self.required_chain_id {
				return Err(VaultError::NetworkSwitchRejected(self.required_chain_id));
			}
		}

		let identity = AccountIdentity { address, chain_id };
		self.identity.send_replace(Some(identity));
		info!("Connected {}", identity);
		Ok(identity)
	}

	/// Forget the current identity.
	pub fn disconnect(&self) {
		if self.identity.send_replace(None).is_some() {
			info!("Disconnected");
		}
	}

	pub fn account(&self) -> Option<Address> {
		self.identity.borrow().map(|identity| identity.address)
	}

	pub fn network_id(&self) -> Option<u64> {
		self.identity.borrow().map(|identity| identity.chain_id)
	}

	pub fn identity(&self) -> Option<AccountIdentity> {
		*self.identity.borrow()
	}

	/// Receiver that observes every identity swap, including re-connects to the same account.
	pub fn subscribe_identity(&self) -> watch::Receiver<Option<AccountIdentity>> {
		self.identity.subscribe()
	}

	/// Native balance of `address`
	pub async fn get_native_balance(&self, address: Address) -> Result<U256, VaultError> {
		self.chain
			.get_balance(address)
			.await
			.map_err(|e| VaultError::Rpc(e.to_string()))
	}

	/// Register a handler for out-of-band account or network changes.
	///
	/// Handlers accumulate; each stays registered until `remove_change_handler` is called.
	pub fn on_account_or_network_change<F>(&self, handler: F) -> HandlerId
	where
		F: Fn(Result<&AccountIdentity, &VaultError>) + Send + Sync + 'static,
	{
		let id = HandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed));
		self.lock_handlers().insert(id, Arc::new(handler));
		id
	}

	/// Deregister a change handler. Returns whether it was registered.
	pub fn remove_change_handler(&self, id: HandlerId) -> bool {
		self.lock_handlers().remove(&id).is_some()
	}

	fn lock_handlers(&self) -> std::sync::MutexGuard<'_, BTreeMap<HandlerId, ChangeHandler>> {
		self.handlers
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Start reacting to the wallet's change notifications.
	///
	/// Returns `None` when there is no wallet to listen to.
	pub fn watch_wallet(self: &Arc<Self>) -> Option<SubscriptionGuard> {
		let mut changes = self.wallet.as_ref()?.subscribe_changes();
		let connection = Arc::clone(self);

		Some(SubscriptionGuard::spawn("wallet-changes", async move {
			loop {
				match changes.recv().await {
					Ok(event) => {
						let _ = connection.apply_wallet_event(event).await;
					}
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						warn!("Missed {} wallet notifications, reconnecting", skipped);
						let _ = connection
							.apply_wallet_event(WalletEvent::AccountsChanged(Vec::new()))
							.await;
					}
					Err(broadcast::error::RecvError::Closed) => break,
				}
			}
		}))
	}

	/// Re-run `connect` after a wallet notification, then run every change handler with the
	/// outcome. A failed reconnect clears the identity.
	pub async fn apply_wallet_event(
		&self,
		event: WalletEvent,
	) -> Result<AccountIdentity, VaultError> {
		debug!("Wallet reported {:?}", event);

		let outcome = self.connect().await;
		if let Err(e) = &outcome {
			warn!("Reconnect after wallet change failed: {}", e);
			self.disconnect();
		}

		let handlers: Vec<ChangeHandler> = self.lock_handlers().values().cloned().collect();
		for handler in handlers {
			handler(outcome.as_ref());
		}
		outcome
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{MockChain, TEST_CHAIN_ID};
	use std::sync::atomic::AtomicUsize;

	fn connection(mock: &Arc<MockChain>) -> Arc<ChainConnection> {
		Arc::new(ChainConnection::new(
			mock.clone(),
			Some(mock.clone()),
			TEST_CHAIN_ID,
		))
	}

	#[tokio::test]
	async fn connect_without_wallet_is_unavailable() {
		let mock = MockChain::new();
		let connection = ChainConnection::new(mock.clone(), None, TEST_CHAIN_ID);
		assert_eq!(connection.connect().await, Err(VaultError::WalletUnavailable));
		assert_eq!(connection.account(), None);
		assert_eq!(connection.network_id(), None);
	}

	#[tokio::test]
	async fn connect_establishes_identity() {
		let mock = MockChain::new();
		let connection = connection(&mock);
		let mut identity_rx = connection.subscribe_identity();

		let identity = connection.connect().await.unwrap();
		assert_eq!(identity.address, mock.account());
		assert_eq!(identity.chain_id, TEST_CHAIN_ID);
		assert_eq!(connection.account(), Some(mock.account()));
		assert_eq!(connection.network_id(), Some(TEST_CHAIN_ID));

		identity_rx.changed().await.unwrap();
		assert_eq!(*identity_rx.borrow(), Some(identity));
	}

	#[tokio::test]
	async fn declined_access_is_user_rejected() {
		let mock = MockChain::new();
		mock.reject_account_access(true);
		let connection = connection(&mock);
		assert!(matches!(
			connection.connect().await,
			Err(VaultError::UserRejected(_))
		));
		assert_eq!(connection.identity(), None);
	}

	#[tokio::test]
	async fn switches_to_the_required_network() {
		let mock = MockChain::new();
		mock.set_wallet_chain(1);
		let connection = connection(&mock);

		let identity = connection.connect().await.unwrap();
		assert_eq!(identity.chain_id, TEST_CHAIN_ID);
		assert_eq!(mock.switch_requests(), vec![TEST_CHAIN_ID]);
	}

	#[tokio::test]
	async fn declined_switch_is_network_switch_rejected() {
		let mock = MockChain::new();
		mock.set_wallet_chain(1);
		mock.reject_chain_switch(true);
		let connection = connection(&mock);

		assert_eq!(
			connection.connect().await,
			Err(VaultError::NetworkSwitchRejected(TEST_CHAIN_ID))
		);
		assert_eq!(connection.identity(), None);
	}

	#[tokio::test]
	async fn change_handlers_accumulate_until_removed() {
		let mock = MockChain::new();
		let connection = connection(&mock);
		connection.connect().await.unwrap();

		let first = Arc::new(AtomicUsize::new(0));
		let second = Arc::new(AtomicUsize::new(0));
		let first_id = {
			let first = first.clone();
			connection.on_account_or_network_change(move |_| {
				first.fetch_add(1, Ordering::SeqCst);
			})
		};
		{
			let second = second.clone();
			connection.on_account_or_network_change(move |_| {
				second.fetch_add(1, Ordering::SeqCst);
			});
		}

		let other = Address::repeat_byte(0x42);
		mock.set_accounts(vec![other]);
		connection
			.apply_wallet_event(WalletEvent::AccountsChanged(vec![other]))
			.await
			.unwrap();
		assert_eq!(first.load(Ordering::SeqCst), 1);
		assert_eq!(second.load(Ordering::SeqCst), 1);
		assert_eq!(connection.account(), Some(other));

		assert!(connection.remove_change_handler(first_id));
		assert!(!connection.remove_change_handler(first_id));
		connection
			.apply_wallet_event(WalletEvent::ChainChanged(TEST_CHAIN_ID))
			.await
			.unwrap();
		assert_eq!(first.load(Ordering::SeqCst), 1);
		assert_eq!(second.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn failed_reconnect_clears_identity_and_notifies() {
		let mock = MockChain::new();
		let connection = connection(&mock);
		connection.connect().await.unwrap();

		let seen = Arc::new(Mutex::new(Vec::new()));
		{
			let seen = seen.clone();
			connection.on_account_or_network_change(move |outcome| {
				seen.lock().unwrap().push(outcome.map(|identity| *identity).map_err(|e| e.clone()));
			});
		}

		mock.set_accounts(Vec::new());
		let outcome = connection
			.apply_wallet_event(WalletEvent::AccountsChanged(Vec::new()))
			.await;
		assert!(matches!(outcome, Err(VaultError::UserRejected(_))));
		assert_eq!(connection.identity(), None);
		let seen = seen.lock().unwrap();
		assert_eq!(seen.len(), 1);
		assert!(matches!(seen[0], Err(VaultError::UserRejected(_))));
	}

	#[tokio::test]
	async fn watch_wallet_reacts_to_notifications() {
		let mock = MockChain::new();
		let connection = connection(&mock);
		connection.connect().await.unwrap();
		let _guard = connection.watch_wallet().unwrap();

		let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
		connection.on_account_or_network_change(move |outcome| {
			let _ = tx.send(outcome.ok().copied());
		});

		let other = Address::repeat_byte(0x24);
		mock.set_accounts(vec![other]);
		mock.emit_wallet_event(WalletEvent::AccountsChanged(vec![other]));

		let identity = rx.recv().await.unwrap().unwrap();
		assert_eq!(identity.address, other);
	}
}
