//! Service configuration from environment variables
//!
//! Controls which node and vault the service talks to, the network the wallet must be on and
//! the polling and timeout knobs. Defaults target a local node on Sepolia's chain id.

use alloy_primitives::Address;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
/// Sepolia
pub const DEFAULT_CHAIN_ID: u64 = 11155111;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_RECEIPT_POLL_MS: u64 = 2000;
pub const DEFAULT_WALLET_POLL_MS: u64 = 4000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
	#[error("{0} must be set")]
	Missing(&'static str),

	#[error("{name} has an invalid value '{value}': {reason}")]
	Invalid {
		name: &'static str,
		value: String,
		reason: String,
	},
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultConfig {
	/// HTTP JSON-RPC endpoint of the node
	pub rpc_url: String,
	/// WebSocket endpoint used for block and log subscriptions
	pub ws_url: String,
	/// Vault contract address
	pub vault_address: Address,
	/// Network the wallet is required to be on
	pub chain_id: u64,
	pub confirmation_timeout: Duration,
	pub receipt_poll_interval: Duration,
	/// How often the node-backed wallet checks for account or network changes
	pub wallet_poll_interval: Duration,
}

impl VaultConfig {
	/// Load configuration from environment variables
	///
	/// Environment variables:
	/// - `VAULT_RPC_URL`: node HTTP endpoint (default `http://127.0.0.1:8545`)
	/// - `VAULT_WS_URL`: node WebSocket endpoint (default derived from `VAULT_RPC_URL`)
	/// - `VAULT_ADDRESS`: vault contract address (required)
	/// - `VAULT_CHAIN_ID`: required network (default 11155111)
	/// - `VAULT_CONFIRMATION_TIMEOUT_SECS`: confirmation wait (default 180)
	/// - `VAULT_RECEIPT_POLL_MS`: receipt polling interval (default 2000)
	/// - `VAULT_WALLET_POLL_MS`: wallet change polling interval (default 4000)
	///
	/// # Examples
	///
	/// ```bash
	/// VAULT_ADDRESS=0x5FbDB2315678afecb367f032d93F642f64180aa3 VAULT_CHAIN_ID=31337 vault-sync watch
	/// ```
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Build the configuration from any variable source.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

		let rpc_url = read("VAULT_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
		let ws_url = match read("VAULT_WS_URL") {
			Some(url) => url,
			None => derive_ws_url(&rpc_url)?,
		};
		info!("Node endpoints: {} / {}", rpc_url, ws_url);

		let vault_address = read("VAULT_ADDRESS").ok_or(ConfigError::Missing("VAULT_ADDRESS"))?;
		let vault_address = parse("VAULT_ADDRESS", &vault_address)?;

		let chain_id = parse_or("VAULT_CHAIN_ID", read("VAULT_CHAIN_ID"), DEFAULT_CHAIN_ID)?;
		let confirmation_timeout = Duration::from_secs(parse_or(
			"VAULT_CONFIRMATION_TIMEOUT_SECS",
			read("VAULT_CONFIRMATION_TIMEOUT_SECS"),
			DEFAULT_CONFIRMATION_TIMEOUT_SECS,
		)?);
		let receipt_poll_interval = Duration::from_millis(parse_or(
			"VAULT_RECEIPT_POLL_MS",
			read("VAULT_RECEIPT_POLL_MS"),
			DEFAULT_RECEIPT_POLL_MS,
		)?);
		let wallet_poll_interval = Duration::from_millis(parse_or(
			"VAULT_WALLET_POLL_MS",
			read("VAULT_WALLET_POLL_MS"),
			DEFAULT_WALLET_POLL_MS,
		)?);
		info!("Vault {} on chain {}", vault_address, chain_id);

		Ok(Self {
			rpc_url,
			ws_url,
			vault_address,
			chain_id,
			confirmation_timeout,
			receipt_poll_interval,
			wallet_poll_interval,
		})
	}
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
		name,
		value: value.to_string(),
		reason: e.to_string(),
	})
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	match value {
		Some(value) => parse(name, &value),
		None => Ok(default),
	}
}

/// `http://host` becomes `ws://host`, `https://host` becomes `wss://host`.
fn derive_ws_url(rpc_url: &str) -> Result<String, ConfigError> {
	if let Some(rest) = rpc_url.strip_prefix("https://") {
		Ok(format!("wss://{}", rest))
	} else if let Some(rest) = rpc_url.strip_prefix("http://") {
		Ok(format!("ws://{}", rest))
	} else {
		Err(ConfigError::Invalid {
			name: "VAULT_RPC_URL",
			value: rpc_url.to_string(),
			reason: "expected an http:// or https:// URL".to_string(),
		})
	}
}
