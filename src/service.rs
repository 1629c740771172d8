//! Vault sync service and integration point for all components.
//!
//! `VaultSyncService` wires the connection, the observable state, the sync engine and the
//! transaction coordinator together and is what callers (the binary in particular) hold. It is
//! responsible for:
//! - Spawning the sync engine and relaying wallet change notifications to the connection
//! - Surfacing connection failures in the status line
//! - Exposing refresh, the three writes and the state observer interface
//! - Tearing everything down in order on shutdown

use crate::chain::{
	AccountIdentity, ChainConnection, ChainProvider, HandlerId, SubscriptionGuard, WalletProvider,
};
use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::sync::{
	StateStore, StatusSource, SyncConfig, SyncEngine, SyncHandle, SyncState, VaultState,
};
use crate::transaction::{OperationReceipt, TransactionCoordinator};

use alloy_primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Settings the service needs from the full configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
	pub vault_address: Address,
	pub chain_id: u64,
	pub confirmation_timeout: Duration,
	pub receipt_poll_interval: Duration,
}

impl From<&VaultConfig> for ServiceConfig {
	fn from(config: &VaultConfig) -> Self {
		Self {
			vault_address: config.vault_address,
			chain_id: config.chain_id,
			confirmation_timeout: config.confirmation_timeout,
			receipt_poll_interval: config.receipt_poll_interval,
		}
	}
}

pub struct VaultSyncService {
	connection: Arc<ChainConnection>,
	store: StateStore,
	sync: SyncHandle,
	coordinator: TransactionCoordinator,
	engine_task: JoinHandle<()>,
	wallet_watch: Option<SubscriptionGuard>,
	reconnect_handler: HandlerId,
}

impl VaultSyncService {
	/// Wire up the components and start the sync engine.
	///
	/// `wallet` is `None` when no wallet is available; `connect` then fails `WalletUnavailable`.
	pub fn start(
		chain: Arc<dyn ChainProvider>,
		wallet: Option<Arc<dyn WalletProvider>>,
		config: ServiceConfig,
	) -> Self {
		let connection = Arc::new(ChainConnection::new(chain, wallet, config.chain_id));
		let store = StateStore::new();

		let engine = SyncEngine::new(
			Arc::clone(&connection),
			store.clone(),
			SyncConfig {
				vault_address: config.vault_address,
				receipt_poll_interval: config.receipt_poll_interval,
			},
		);
		let sync = engine.handle();
		let coordinator = TransactionCoordinator::new(engine.vault_client(), sync.clone(), store.clone())
			.with_confirmation_timeout(config.confirmation_timeout);
		let engine_task = engine.spawn();
		let reconnect_handler = {
			let store = store.clone();
			connection.on_account_or_network_change(move |outcome| {
				publish_connect_outcome(&store, outcome)
			})
		};
		let wallet_watch = connection.watch_wallet();

		info!(
			"Vault sync service started for vault {} on chain {}",
			config.vault_address, config.chain_id
		);

		Self {
			connection,
			store,
			sync,
			coordinator,
			engine_task,
			wallet_watch,
			reconnect_handler,
		}
	}

	pub fn connection(&self) -> &Arc<ChainConnection> {
		&self.connection
	}

	/// Connect the wallet. Failures are also written to the status line.
	pub async fn connect(&self) -> Result<AccountIdentity, VaultError> {
		let outcome = self.connection.connect().await;
		if let Err(e) = &outcome {
			warn!("Connect failed: {}", e);
		}
		publish_connect_outcome(&self.store, outcome.as_ref());
		outcome
	}

	/// Request a balance refresh
	pub fn refresh(&self) {
		self.sync.request_refresh();
	}

	/// Request a refresh and wait until it, and anything coalesced into it, has finished.
	pub async fn refresh_and_wait(&self) -> VaultState {
		// Let the engine pick up the current identity first, or the refresh would find it unbound.
		let identity = self.connection.identity();
		self.store.wait_for(|state| state.identity == identity).await;

		let completed = self.store.current().refresh.fetches_completed;
		self.refresh();
		self.store
			.wait_for(|state| {
				state.identity.is_none()
					|| (state.refresh.fetches_completed > completed
						&& state.sync_state == SyncState::Idle)
			})
			.await
	}

	pub async fn deposit(&self, amount: &str) -> Result<OperationReceipt, VaultError> {
		self.coordinator.deposit(amount).await
	}

	pub async fn withdraw(&self, amount: &str) -> Result<OperationReceipt, VaultError> {
		self.coordinator.withdraw(amount).await
	}

	pub async fn withdraw_all(&self) -> Result<OperationReceipt, VaultError> {
		self.coordinator.withdraw_all().await
	}

	/// Observe every state change
	pub fn subscribe(&self) -> watch::Receiver<VaultState> {
		self.store.subscribe()
	}

	pub fn state(&self) -> VaultState {
		self.store.current()
	}

	pub fn store(&self) -> &StateStore {
		&self.store
	}

	/// Stop listening, stop the engine and clear the identity.
	pub async fn shutdown(self) {
		if let Some(watch) = self.wallet_watch {
			watch.unsubscribe();
		}
		self.connection.remove_change_handler(self.reconnect_handler);
		self.sync.shutdown();
		if let Err(e) = self.engine_task.await {
			warn!("Sync engine task ended abnormally: {}", e);
		}
		self.connection.disconnect();
		info!("Vault sync service stopped");
	}
}

/// Connect failures, including reconnects after a wallet notification, own the status line until
/// the next successful connect.
fn publish_connect_outcome(store: &StateStore, outcome: Result<&AccountIdentity, &VaultError>) {
	match outcome {
		Ok(_) => store.clear_status_from(StatusSource::Connection),
		Err(e) => store.set_status(e.to_string(), StatusSource::Connection),
	}
}
