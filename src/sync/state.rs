//! Observable application state.
//!
//! `StateStore` is the one place the UI-facing state lives. Writers (the sync engine, the
//! transaction coordinator and the service) go through its methods; readers either take a
//! copy with `current` or hold a `watch::Receiver` from `subscribe` and are woken on every
//! change. A receiver is the subscription: dropping it unsubscribes.

use crate::chain::AccountIdentity;
use crate::error::VaultError;
use crate::sync::progress_tracker::RefreshStats;
use crate::sync::snapshot::BalanceSnapshot;
use crate::transaction::PendingOperation;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

/// Refresh lifecycle of the sync engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncState {
	/// No fetch in flight
	#[default]
	Idle,
	/// A fetch is in flight and nothing arrived since it started
	Refreshing,
	/// A fetch is in flight and at least one trigger arrived after it started
	Stale,
	/// The last fetch had a failed read; the next trigger retries
	Error,
}

/// Who wrote the current status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
	Connection,
	Sync,
	Transaction,
}

/// The single human-readable status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
	pub text: String,
	pub source: StatusSource,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultState {
	/// Connected account and network, `None` while disconnected
	pub identity: Option<AccountIdentity>,
	pub snapshot: BalanceSnapshot,
	/// The write currently in flight, if any
	pub pending: Option<PendingOperation>,
	/// The most recent write that reached a terminal status
	pub last_operation: Option<PendingOperation>,
	pub status: Option<StatusMessage>,
	pub sync_state: SyncState,
	pub refresh: RefreshStats,
}

impl VaultState {
	pub fn status_text(&self) -> Option<&str> {
		self.status.as_ref().map(|status| status.text.as_str())
	}
}

/// Shared handle to the observable state
#[derive(Debug, Clone)]
pub struct StateStore {
	state: Arc<watch::Sender<VaultState>>,
}

impl Default for StateStore {
	fn default() -> Self {
		Self::new()
	}
}

impl StateStore {
	pub fn new() -> Self {
		let (state, _) = watch::channel(VaultState::default());
		Self {
			state: Arc::new(state),
		}
	}

	/// Receiver woken on every state change
	pub fn subscribe(&self) -> watch::Receiver<VaultState> {
		self.state.subscribe()
	}

	/// Copy of the current state
	pub fn current(&self) -> VaultState {
		self.state.borrow().clone()
	}

	pub fn snapshot(&self) -> BalanceSnapshot {
		self.state.borrow().snapshot
	}

	pub fn pending(&self) -> Option<PendingOperation> {
		self.state.borrow().pending.clone()
	}

	/// Wait until `predicate` holds and return the state it held for.
	pub async fn wait_for<F>(&self, predicate: F) -> VaultState
	where
		F: FnMut(&VaultState) -> bool,
	{
		let mut rx = self.state.subscribe();
		// The sender lives in `self`, so the channel cannot close while we wait.
		match rx.wait_for(predicate).await {
			Ok(state) => state.clone(),
			Err(_) => self.current(),
		}
	}

	/// Overwrite the status line
	pub(crate) fn set_status(&self, text: impl Into<String>, source: StatusSource) {
		let text = text.into();
		self.state.send_modify(|state| {
			state.status = Some(StatusMessage {
				text,
				source,
				updated_at: Utc::now(),
			});
		});
	}

	/// Clear the status line if `source` wrote it
	pub(crate) fn clear_status_from(&self, source: StatusSource) {
		self.state.send_if_modified(|state| {
			if state.status.as_ref().is_some_and(|status| status.source == source) {
				state.status = None;
				true
			} else {
				false
			}
		});
	}

	pub(crate) fn replace_snapshot(&self, snapshot: BalanceSnapshot) {
		self.state.send_modify(|state| state.snapshot = snapshot);
	}

	pub(crate) fn set_sync_state(&self, sync_state: SyncState, refresh: RefreshStats) {
		self.state.send_if_modified(|state| {
			if state.sync_state == sync_state && state.refresh == refresh {
				return false;
			}
			state.sync_state = sync_state;
			state.refresh = refresh;
			true
		});
	}

	/// Record the identity the state now belongs to.
	///
	/// Balances read for a different identity are meaningless, so the snapshot is reset when
	/// the identity actually changes.
	pub(crate) fn set_identity(&self, identity: Option<AccountIdentity>) {
		self.state.send_if_modified(|state| {
			if state.identity == identity {
				return false;
			}
			state.identity = identity;
			state.snapshot = BalanceSnapshot::default();
			true
		});
	}

	/// Install `operation` as the pending write unless one is already in flight.
	pub(crate) fn try_begin_operation(&self, operation: PendingOperation) -> Result<(), VaultError> {
		let mut busy = None;
		self.state.send_if_modified(|state| match &state.pending {
			Some(pending) => {
				busy = Some(pending.kind);
				false
			}
			None => {
				state.pending = Some(operation);
				true
			}
		});
		match busy {
			Some(kind) => Err(VaultError::OperationInProgress(kind)),
			None => Ok(()),
		}
	}

	pub(crate) fn update_pending<F>(&self, update: F)
	where
		F: FnOnce(&mut PendingOperation),
	{
		self.state.send_if_modified(|state| match state.pending.as_mut() {
			Some(pending) => {
				update(pending);
				true
			}
			None => false,
		});
	}

	/// Retire the pending write, keeping it as `last_operation`
	pub(crate) fn clear_pending(&self) {
		self.state.send_if_modified(|state| match state.pending.take() {
			Some(finished) => {
				state.last_operation = Some(finished);
				true
			}
			None => false,
		});
	}
}
