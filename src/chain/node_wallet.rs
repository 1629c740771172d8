//! Wallet provider backed by a node's unlocked accounts.
//!
//! Dev nodes (anvil, hardhat, geth `--dev`) and signer proxies expose accounts and sign
//! `eth_sendTransaction` themselves. There is no push channel for account or chain changes on a
//! plain node, so a poller compares the node's answers and emits `WalletEvent`s on differences.

use crate::chain::{SubscriptionGuard, WalletEvent, WalletProvider};
use crate::rpc::{JsonRpcClient, RpcError, TransactionRequest, codes};

use alloy_primitives::{Address, B256, U64};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub struct NodeWallet {
	client: JsonRpcClient,
	changes: broadcast::Sender<WalletEvent>,
}

impl NodeWallet {
	pub fn new(client: JsonRpcClient) -> Self {
		let (changes, _) = broadcast::channel(16);
		Self { client, changes }
	}

	async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
		self.client.request("eth_accounts", json!([])).await
	}

	/// Start polling the node for account and chain changes every `interval`.
	pub fn spawn_change_poller(self: &Arc<Self>, interval: Duration) -> SubscriptionGuard {
		let wallet = Arc::clone(self);
		SubscriptionGuard::spawn("wallet-change-poller", async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			let mut last_accounts: Option<Vec<Address>> = None;
			let mut last_chain: Option<u64> = None;

			loop {
				ticker.tick().await;

				match wallet.accounts().await {
					Ok(accounts) => {
						if last_accounts.as_ref().is_some_and(|previous| *previous != accounts) {
							info!("Wallet accounts changed: {:?}", accounts);
							let _ = wallet.changes.send(WalletEvent::AccountsChanged(accounts.clone()));
						}
						last_accounts = Some(accounts);
					}
					Err(e) => debug!("Account poll failed: {}", e),
				}

				match WalletProvider::chain_id(wallet.as_ref()).await {
					Ok(chain_id) => {
						if last_chain.is_some_and(|previous| previous != chain_id) {
							info!("Wallet chain changed to {}", chain_id);
							let _ = wallet.changes.send(WalletEvent::ChainChanged(chain_id));
						}
						last_chain = Some(chain_id);
					}
					Err(e) => debug!("Chain id poll failed: {}", e),
				}
			}
		})
	}
}

#[async_trait::async_trait]
impl WalletProvider for NodeWallet {
	async fn request_accounts(&self) -> Result<Vec<Address>, RpcError> {
		match self.client.request("eth_requestAccounts", json!([])).await {
			Err(e) if e.code() == Some(codes::METHOD_NOT_FOUND) => {
				debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
				self.accounts().await
			}
			other => other,
		}
	}

	async fn chain_id(&self) -> Result<u64, RpcError> {
		let chain_id: U64 = self.client.request("eth_chainId", json!([])).await?;
		Ok(chain_id.to::<u64>())
	}

	async fn switch_chain(&self, chain_id: u64) -> Result<(), RpcError> {
		let _: Value = self
			.client
			.request(
				"wallet_switchEthereumChain",
				json!([{ "chainId": format!("{:#x}", chain_id) }]),
			)
			.await?;
		Ok(())
	}

	async fn send_transaction(&self, request: TransactionRequest) -> Result<B256, RpcError> {
		self.client
			.request("eth_sendTransaction", json!([request]))
			.await
	}

	fn subscribe_changes(&self) -> broadcast::Receiver<WalletEvent> {
		self.changes.subscribe()
	}
}
