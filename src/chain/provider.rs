//! Provider boundaries consumed by the connection and the vault client.
//!
//! `ChainProvider` covers read access and subscriptions against the node. `WalletProvider` is the
//! signer side: account access, network switching and sending transactions. The two are split
//! because a wallet may be missing entirely while reads still work.

use crate::rpc::{BlockHeader, Log, LogFilter, RpcError, TransactionReceipt, TransactionRequest};

use alloy_primitives::{Address, B256, Bytes, U256};
use futures_util::stream::BoxStream;
use tokio::sync::broadcast;

/// Stream of items pushed by a node subscription.
pub type SubscriptionStream<T> = BoxStream<'static, Result<T, RpcError>>;

/// Out-of-band notifications from the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
	/// The set (or order) of authorized accounts changed.
	AccountsChanged(Vec<Address>),
	/// The wallet moved to another chain.
	ChainChanged(u64),
}

/// Read access to the chain.
#[async_trait::async_trait]
pub trait ChainProvider: Send + Sync {
	/// Chain id the node is serving
	async fn chain_id(&self) -> Result<u64, RpcError>;

	/// Native balance of `address` at the latest block
	async fn get_balance(&self, address: Address) -> Result<U256, RpcError>;

	/// Execute a read-only call against the latest block
	async fn call(&self, request: &TransactionRequest) -> Result<Bytes, RpcError>;

	/// Receipt of a transaction, `None` while it is still pending
	async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, RpcError>;

	/// Stream of new block headers
	async fn subscribe_blocks(&self) -> Result<SubscriptionStream<BlockHeader>, RpcError>;

	/// Stream of logs matching `filter`
	async fn subscribe_logs(&self, filter: LogFilter) -> Result<SubscriptionStream<Log>, RpcError>;
}

/// The injected wallet: account access and signing.
#[async_trait::async_trait]
pub trait WalletProvider: Send + Sync {
	/// Ask for account access. The first returned account is the active one.
	async fn request_accounts(&self) -> Result<Vec<Address>, RpcError>;

	/// Chain id the wallet is currently pointed at
	async fn chain_id(&self) -> Result<u64, RpcError>;

	/// Ask the wallet to switch to `chain_id`
	async fn switch_chain(&self, chain_id: u64) -> Result<(), RpcError>;

	/// Sign and broadcast a transaction, returning its hash once the network accepted it
	async fn send_transaction(&self, request: TransactionRequest) -> Result<B256, RpcError>;

	/// Receiver for account and chain change notifications
	fn subscribe_changes(&self) -> broadcast::Receiver<WalletEvent>;
}
