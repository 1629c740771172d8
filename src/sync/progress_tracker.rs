//! Refresh tracking for the sync engine.
//!
//! This module provides the `RefreshTracker`, which records how many triggers arrived (per
//! kind), how many of them were coalesced into an already running refresh, and how each fetch
//! ended. The statistics are published with the engine state so observers and tests can see
//! exactly how many fetches a burst of triggers produced.

use crate::sync::events::TriggerKind;

use std::collections::BTreeMap;
use tracing::info;

/// Log a progress line every this many finished fetches.
const LOG_INTERVAL: u64 = 100;

/// Service for tracking refresh activity
#[derive(Debug, Clone, Default)]
pub struct RefreshTracker {
	/// Triggers received, per origin
	triggers: BTreeMap<TriggerKind, u64>,
	/// Triggers that arrived while a fetch was already in flight
	coalesced_triggers: u64,
	fetches_started: u64,
	fetches_succeeded: u64,
	/// Fetches where at least one of the three reads failed
	fetches_failed: u64,
	/// Fetches whose result belonged to a replaced identity
	fetches_discarded: u64,
	/// Finished-fetch count at the last progress line
	last_logged: u64,
}

impl RefreshTracker {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record_trigger(&mut self, kind: TriggerKind) {
		*self.triggers.entry(kind).or_default() += 1;
	}

	pub fn record_coalesced(&mut self) {
		self.coalesced_triggers += 1;
	}

	pub fn record_fetch_started(&mut self) {
		self.fetches_started += 1;
	}

	pub fn record_fetch_succeeded(&mut self) {
		self.fetches_succeeded += 1;
		self.log_progress(false);
	}

	pub fn record_fetch_failed(&mut self) {
		self.fetches_failed += 1;
		self.log_progress(false);
	}

	pub fn record_fetch_discarded(&mut self) {
		self.fetches_discarded += 1;
	}

	fn fetches_completed(&self) -> u64 {
		self.fetches_succeeded + self.fetches_failed + self.fetches_discarded
	}

	/// Log progress at regular intervals or when forced
	pub fn log_progress(&mut self, force: bool) {
		let completed = self.fetches_completed();
		if force || completed.saturating_sub(self.last_logged) >= LOG_INTERVAL {
			info!("Refresh progress: {}", self.stats().summary());
			self.last_logged = completed;
		}
	}

	/// Get refresh statistics as a RefreshStats struct
	pub fn stats(&self) -> RefreshStats {
		RefreshStats {
			triggers_received: self.triggers.values().sum(),
			triggers_by_kind: self.triggers.clone(),
			coalesced_triggers: self.coalesced_triggers,
			fetches_started: self.fetches_started,
			fetches_completed: self.fetches_completed(),
			fetches_succeeded: self.fetches_succeeded,
			fetches_failed: self.fetches_failed,
			fetches_discarded: self.fetches_discarded,
		}
	}
}

/// Statistics about refresh activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStats {
	pub triggers_received: u64,
	pub triggers_by_kind: BTreeMap<TriggerKind, u64>,
	pub coalesced_triggers: u64,
	pub fetches_started: u64,
	/// Succeeded, failed and discarded fetches together
	pub fetches_completed: u64,
	pub fetches_succeeded: u64,
	pub fetches_failed: u64,
	pub fetches_discarded: u64,
}

impl RefreshStats {
	/// Get a human-readable summary of the refresh statistics
	pub fn summary(&self) -> String {
		format!(
			"{} triggers ({} coalesced), {} fetches: {} succeeded, {} failed{}",
			self.triggers_received,
			self.coalesced_triggers,
			self.fetches_started,
			self.fetches_succeeded,
			self.fetches_failed,
			if self.fetches_discarded == 0 {
				String::new()
			} else {
				format!(", {} discarded", self.fetches_discarded)
			}
		)
	}
}
