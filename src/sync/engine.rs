//! Coalescing balance refresh engine.
//!
//! The `SyncEngine` runs as one Tokio task and owns everything that refreshes the balance
//! snapshot: the binding to the connected account (a `VaultClient` plus its block and vault
//! event listeners), the Idle/Refreshing/Stale/Error state machine and the refresh statistics.
//!
//! Every trigger is handled the same way:
//! - with no fetch in flight, a fetch of the three balances starts;
//! - with a fetch in flight, the engine only remembers that it went stale.
//!
//! When a fetch finishes on a stale engine exactly one more fetch starts, so a burst of N
//! triggers during one fetch costs one trailing fetch, never N. Results for an identity that
//! has been replaced in the meantime are discarded.

use crate::chain::{AccountIdentity, ChainConnection, SubscriptionGuard, spawn_resubscribing};
use crate::rpc::BlockHeader;
use crate::sync::events::{SyncCommand, SyncTrigger};
use crate::sync::progress_tracker::RefreshTracker;
use crate::sync::snapshot::BalanceReads;
use crate::sync::state::{StateStore, StatusSource, SyncState};
use crate::vault::{VaultClient, client::DEFAULT_RECEIPT_POLL_INTERVAL};

use alloy_primitives::{Address, B256};
use chrono::Utc;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
	/// The vault contract to track
	pub vault_address: Address,
	/// Receipt polling interval for the vault clients the engine builds
	pub receipt_poll_interval: Duration,
}

impl SyncConfig {
	pub fn new(vault_address: Address) -> Self {
		Self {
			vault_address,
			receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
		}
	}
}

/// Cloneable handle for feeding triggers to a running engine.
#[derive(Debug, Clone)]
pub struct SyncHandle {
	commands: mpsc::UnboundedSender<SyncCommand>,
}

impl SyncHandle {
	/// Ask for a refresh. Never blocks; coalesced with any refresh already running.
	pub fn request_refresh(&self) {
		self.trigger(SyncTrigger::Manual);
	}

	pub fn trigger(&self, trigger: SyncTrigger) {
		if self.commands.send(SyncCommand::Trigger(trigger)).is_err() {
			debug!("Sync engine stopped, dropping trigger");
		}
	}

	/// Report that a locally submitted transaction was confirmed
	pub fn notify_transaction_completed(&self, submission: B256) {
		self.trigger(SyncTrigger::TransactionCompleted { submission });
	}

	/// Stop the engine and release its subscriptions
	pub fn shutdown(&self) {
		let _ = self.commands.send(SyncCommand::Shutdown);
	}
}

/// Everything tied to one connected identity. Dropping it releases the listeners.
struct Binding {
	identity: AccountIdentity,
	vault: Arc<VaultClient>,
	subscriptions: Vec<SubscriptionGuard>,
}

struct FetchOutcome {
	identity: AccountIdentity,
	reads: BalanceReads,
}

type FetchFuture = BoxFuture<'static, FetchOutcome>;

pub struct SyncEngine {
	connection: Arc<ChainConnection>,
	store: StateStore,
	config: SyncConfig,
	commands_tx: mpsc::UnboundedSender<SyncCommand>,
	commands: mpsc::UnboundedReceiver<SyncCommand>,
	identity_rx: watch::Receiver<Option<AccountIdentity>>,
	vault_tx: watch::Sender<Option<Arc<VaultClient>>>,
	binding: Option<Binding>,
	state: SyncState,
	tracker: RefreshTracker,
}

impl SyncEngine {
	pub fn new(connection: Arc<ChainConnection>, store: StateStore, config: SyncConfig) -> Self {
		let (commands_tx, commands) = mpsc::unbounded_channel();
		let identity_rx = connection.subscribe_identity();
		let (vault_tx, _) = watch::channel(None);

		Self {
			connection,
			store,
			config,
			commands_tx,
			commands,
			identity_rx,
			vault_tx,
			binding: None,
			state: SyncState::Idle,
			tracker: RefreshTracker::new(),
		}
	}

	pub fn handle(&self) -> SyncHandle {
		SyncHandle {
			commands: self.commands_tx.clone(),
		}
	}

	/// Receiver for the vault client bound to the current identity, `None` while disconnected.
	pub fn vault_client(&self) -> watch::Receiver<Option<Arc<VaultClient>>> {
		self.vault_tx.subscribe()
	}

	pub fn spawn(self) -> JoinHandle<()> {
		tokio::spawn(self.run())
	}

	/// Run until `SyncHandle::shutdown` is called.
	pub async fn run(mut self) {
		info!("Starting vault sync engine for {}", self.config.vault_address);
		let mut in_flight: Option<FetchFuture> = None;
		let mut identity_open = true;

		let initial = *self.identity_rx.borrow_and_update();
		if initial.is_some() {
			self.on_identity(initial, &mut in_flight);
		}

		loop {
			tokio::select! {
				command = self.commands.recv() => match command {
					Some(SyncCommand::Trigger(trigger)) => self.on_trigger(trigger, &mut in_flight),
					Some(SyncCommand::Shutdown) | None => break,
				},
				changed = self.identity_rx.changed(), if identity_open => {
					if changed.is_ok() {
						let identity = *self.identity_rx.borrow_and_update();
						self.on_identity(identity, &mut in_flight);
					} else {
						identity_open = false;
					}
				},
				outcome = next_outcome(&mut in_flight), if in_flight.is_some() => {
					in_flight = None;
					self.on_fetch_complete(outcome, &mut in_flight);
				},
			}
		}

		self.binding = None;
		self.vault_tx.send_replace(None);
		self.tracker.log_progress(true);
		info!("Vault sync engine stopped");
	}

	fn on_identity(&mut self, identity: Option<AccountIdentity>, in_flight: &mut Option<FetchFuture>) {
		self.rebind(identity);
		self.on_trigger(SyncTrigger::AccountOrNetworkChanged, in_flight);
	}

	fn on_trigger(&mut self, trigger: SyncTrigger, in_flight: &mut Option<FetchFuture>) {
		debug!("Refresh requested by {}", trigger);
		self.tracker.record_trigger(trigger.kind());

		match self.state {
			SyncState::Refreshing | SyncState::Stale => {
				self.state = SyncState::Stale;
				self.tracker.record_coalesced();
			}
			SyncState::Idle | SyncState::Error => self.start_fetch(in_flight),
		}
		self.publish();
	}

	fn start_fetch(&mut self, in_flight: &mut Option<FetchFuture>) {
		let Some(binding) = &self.binding else {
			debug!("Not connected, nothing to refresh");
			self.state = SyncState::Idle;
			return;
		};

		let identity = binding.identity;
		let vault = Arc::clone(&binding.vault);
		let connection = Arc::clone(&self.connection);
		*in_flight = Some(Box::pin(async move {
			let account = identity.address;
			let (wallet_balance, vault_balance, vault_tvl) = tokio::join!(
				connection.get_native_balance(account),
				vault.balance_of(account),
				connection.get_native_balance(vault.address()),
			);
			FetchOutcome {
				identity,
				reads: BalanceReads {
					wallet_balance,
					vault_balance,
					vault_tvl,
				},
			}
		}));

		self.state = SyncState::Refreshing;
		self.tracker.record_fetch_started();
	}

	fn on_fetch_complete(&mut self, outcome: FetchOutcome, in_flight: &mut Option<FetchFuture>) {
		let rerun = self.state == SyncState::Stale;
		let current = self.binding.as_ref().map(|binding| binding.identity);

		if current != Some(outcome.identity) {
			debug!("Discarding balances read for {}", outcome.identity);
			self.tracker.record_fetch_discarded();
		} else {
			let (snapshot, failures) = self.store.snapshot().merge(outcome.reads, Utc::now());
			self.store.replace_snapshot(snapshot);

			if failures.is_empty() {
				debug!("Refreshed {}", snapshot);
				self.tracker.record_fetch_succeeded();
				self.store.clear_status_from(StatusSource::Sync);
			} else {
				let message = failures
					.iter()
					.map(|(field, e)| format!("Failed to refresh {}: {}", field, e))
					.collect::<Vec<_>>()
					.join("; ");
				warn!("{}", message);
				self.tracker.record_fetch_failed();
				self.store.set_status(message, StatusSource::Sync);
				self.state = SyncState::Error;
				self.publish();
			}
		}

		if rerun {
			self.start_fetch(in_flight);
		} else {
			self.state = SyncState::Idle;
		}
		self.publish();
	}

	/// Point the engine at `identity`, replacing the previous binding if it differs.
	fn rebind(&mut self, identity: Option<AccountIdentity>) {
		if self.binding.as_ref().map(|binding| binding.identity) == identity {
			return;
		}

		if let Some(previous) = self.binding.take() {
			info!(
				"Releasing {} subscriptions for {}",
				previous.subscriptions.len(),
				previous.identity
			);
		}
		self.store.set_identity(identity);

		let Some(identity) = identity else {
			self.vault_tx.send_replace(None);
			return;
		};
		let Some(signer) = self.connection.wallet() else {
			warn!("Connected without a wallet, cannot bind {}", identity);
			self.vault_tx.send_replace(None);
			return;
		};

		let vault = Arc::new(
			VaultClient::new(
				self.connection.chain(),
				signer,
				self.config.vault_address,
				identity.address,
			)
			.with_receipt_poll_interval(self.config.receipt_poll_interval),
		);
		let subscriptions = self.subscribe(&vault);
		info!("Bound vault {} to {}", vault.address(), identity);

		self.vault_tx.send_replace(Some(Arc::clone(&vault)));
		self.binding = Some(Binding {
			identity,
			vault,
			subscriptions,
		});
	}

	/// Start the block and vault event listeners that feed triggers back into the engine.
	fn subscribe(&self, vault: &VaultClient) -> Vec<SubscriptionGuard> {
		let blocks = {
			let chain = self.connection.chain();
			let handle = self.handle();
			spawn_resubscribing(
				"new-heads",
				move || {
					let chain = Arc::clone(&chain);
					async move { chain.subscribe_blocks().await }
				},
				move |header: BlockHeader| handle.trigger(SyncTrigger::from(&header)),
			)
		};

		let deposits = {
			let handle = self.handle();
			vault.on_deposited(move |depositor, amount| {
				handle.trigger(SyncTrigger::Deposited { depositor, amount })
			})
		};

		let withdrawals = {
			let handle = self.handle();
			vault.on_withdrew(move |depositor, amount| {
				handle.trigger(SyncTrigger::Withdrew { depositor, amount })
			})
		};

		vec![blocks, deposits, withdrawals]
	}

	fn publish(&self) {
		self.store.set_sync_state(self.state, self.tracker.stats());
	}
}

async fn next_outcome(in_flight: &mut Option<FetchFuture>) -> FetchOutcome {
	match in_flight {
		Some(fetch) => fetch.await,
		None => std::future::pending().await,
	}
}
