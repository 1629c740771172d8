//! The three balances the sync layer tracks.

use crate::error::VaultError;
use crate::utils::{Unit, format_units};

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use std::fmt;

/// A native-currency amount held in wei, with its display scalings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct NativeAmount(U256);

impl NativeAmount {
	pub fn from_wei(wei: U256) -> Self {
		Self(wei)
	}

	pub fn wei(&self) -> U256 {
		self.0
	}

	pub fn gwei(&self) -> String {
		format_units(self.0, Unit::GWEI)
	}

	pub fn ether(&self) -> String {
		format_units(self.0, Unit::ETHER)
	}
}

impl fmt::Display for NativeAmount {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ETH", self.ether())
	}
}

/// Which of the three quantities a read was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BalanceField {
	WalletBalance,
	VaultBalance,
	VaultTvl,
}

impl fmt::Display for BalanceField {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BalanceField::WalletBalance => write!(f, "wallet balance"),
			BalanceField::VaultBalance => write!(f, "vault balance"),
			BalanceField::VaultTvl => write!(f, "vault TVL"),
		}
	}
}

/// Results of the three independent reads of one refresh.
#[derive(Debug, Clone)]
pub struct BalanceReads {
	pub wallet_balance: Result<U256, VaultError>,
	pub vault_balance: Result<U256, VaultError>,
	pub vault_tvl: Result<U256, VaultError>,
}

/// Immutable view of the tracked balances.
///
/// Replaced as a whole after every refresh; a field whose read failed carries its previous value
/// into the replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
	pub wallet_balance: NativeAmount,
	pub vault_balance: NativeAmount,
	pub vault_tvl: NativeAmount,
	/// When the refresh that produced this snapshot completed. `None` before the first one.
	pub fetched_at: Option<DateTime<Utc>>,
}

impl BalanceSnapshot {
	/// Build the next snapshot from a refresh, keeping prior values for failed reads.
	///
	/// Returns the failed reads alongside.
	pub fn merge(
		&self,
		reads: BalanceReads,
		fetched_at: DateTime<Utc>,
	) -> (BalanceSnapshot, Vec<(BalanceField, VaultError)>) {
		let mut failures = Vec::new();
		let mut pick = |field: BalanceField, read: Result<U256, VaultError>, prior: NativeAmount| {
			match read {
				Ok(wei) => NativeAmount::from_wei(wei),
				Err(e) => {
					failures.push((field, e));
					prior
				}
			}
		};

		let next = BalanceSnapshot {
			wallet_balance: pick(
				BalanceField::WalletBalance,
				reads.wallet_balance,
				self.wallet_balance,
			),
			vault_balance: pick(
				BalanceField::VaultBalance,
				reads.vault_balance,
				self.vault_balance,
			),
			vault_tvl: pick(BalanceField::VaultTvl, reads.vault_tvl, self.vault_tvl),
			fetched_at: Some(fetched_at),
		};
		(next, failures)
	}
}

impl fmt::Display for BalanceSnapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"wallet {} | vault {} ({} wei) | TVL {}",
			self.wallet_balance,
			self.vault_balance,
			self.vault_balance.wei(),
			self.vault_tvl
		)
	}
}
