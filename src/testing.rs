//! In-memory chain and wallet used by the unit tests.
//!
//! `MockChain` implements both provider traits over a small ledger that understands the vault's
//! four calls, mines one block per transaction and pushes logs and headers to subscribers.
//! Knobs on the mock inject the wallet and node failures the tests need.

use crate::chain::{ChainProvider, SubscriptionStream, WalletEvent, WalletProvider};
use crate::rpc::{
	BlockHeader, Log, LogFilter, RpcError, TransactionReceipt, TransactionRequest, codes,
};
use crate::sync::{StateStore, VaultState};
use crate::utils::{Unit, parse_units};
use crate::vault::{VaultEventKind, abi};

use alloy_primitives::{Address, B256, Bytes, U64, U256, keccak256};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

pub const TEST_CHAIN_ID: u64 = 11155111;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Parse an ether amount into wei
pub fn ether(text: &str) -> U256 {
	parse_units(text, Unit::ETHER).unwrap()
}

/// Wait until the store satisfies `predicate`, failing the test after a few seconds.
pub async fn wait_until<F>(store: &StateStore, predicate: F) -> VaultState
where
	F: FnMut(&VaultState) -> bool,
{
	tokio::time::timeout(WAIT_LIMIT, store.wait_for(predicate))
		.await
		.expect("state never reached the expected condition")
}

struct Ledger {
	accounts: Vec<Address>,
	wallet_chain: u64,
	balances: HashMap<Address, U256>,
	deposits: HashMap<Address, U256>,
	receipts: HashMap<B256, TransactionReceipt>,
	block_number: u64,
	reject_access: bool,
	reject_switch: bool,
	reject_signatures: bool,
	hold_receipts: bool,
	fail_vault_calls: bool,
	failing_balances: HashSet<Address>,
	switch_requests: Vec<u64>,
	sent_transactions: usize,
	balance_reads: usize,
}

pub struct MockChain {
	account: Address,
	vault: Address,
	ledger: Mutex<Ledger>,
	logs: broadcast::Sender<Log>,
	blocks: broadcast::Sender<BlockHeader>,
	wallet_events: broadcast::Sender<WalletEvent>,
	log_subscriptions: watch::Sender<usize>,
	block_subscriptions: watch::Sender<usize>,
	/// Reads wait while this is `false`
	read_gate: watch::Sender<bool>,
}

impl MockChain {
	pub fn new() -> Arc<Self> {
		let account = Address::repeat_byte(0xa1);
		let vault = Address::repeat_byte(0xfe);
		let balances = HashMap::from([(account, ether("100")), (vault, U256::ZERO)]);

		Arc::new(Self {
			account,
			vault,
			ledger: Mutex::new(Ledger {
				accounts: vec![account],
				wallet_chain: TEST_CHAIN_ID,
				balances,
				deposits: HashMap::new(),
				receipts: HashMap::new(),
				block_number: 0,
				reject_access: false,
				reject_switch: false,
				reject_signatures: false,
				hold_receipts: false,
				fail_vault_calls: false,
				failing_balances: HashSet::new(),
				switch_requests: Vec::new(),
				sent_transactions: 0,
				balance_reads: 0,
			}),
			logs: broadcast::channel(64).0,
			blocks: broadcast::channel(64).0,
			wallet_events: broadcast::channel(16).0,
			log_subscriptions: watch::channel(0).0,
			block_subscriptions: watch::channel(0).0,
			read_gate: watch::channel(true).0,
		})
	}

	fn ledger(&self) -> MutexGuard<'_, Ledger> {
		self.ledger.lock().unwrap()
	}

	/// The account the wallet authorizes by default
	pub fn account(&self) -> Address {
		self.account
	}

	/// The vault contract address
	pub fn vault(&self) -> Address {
		self.vault
	}

	pub fn set_accounts(&self, accounts: Vec<Address>) {
		self.ledger().accounts = accounts;
	}

	pub fn set_wallet_chain(&self, chain_id: u64) {
		self.ledger().wallet_chain = chain_id;
	}

	pub fn set_balance(&self, address: Address, balance: U256) {
		self.ledger().balances.insert(address, balance);
	}

	pub fn reject_account_access(&self, reject: bool) {
		self.ledger().reject_access = reject;
	}

	pub fn reject_chain_switch(&self, reject: bool) {
		self.ledger().reject_switch = reject;
	}

	pub fn reject_signatures(&self, reject: bool) {
		self.ledger().reject_signatures = reject;
	}

	/// While held, receipts are reported as not yet available
	pub fn hold_receipts(&self, hold: bool) {
		self.ledger().hold_receipts = hold;
	}

	/// Make every vault `eth_call` fail with a transport-level error
	pub fn fail_vault_calls(&self, fail: bool) {
		self.ledger().fail_vault_calls = fail;
	}

	/// Make native balance reads of `address` fail
	pub fn fail_balance_of(&self, address: Address, fail: bool) {
		let mut ledger = self.ledger();
		if fail {
			ledger.failing_balances.insert(address);
		} else {
			ledger.failing_balances.remove(&address);
		}
	}

	/// Hold every balance read and `eth_call` until `open_read_gate`
	pub fn close_read_gate(&self) {
		self.read_gate.send_replace(false);
	}

	pub fn open_read_gate(&self) {
		self.read_gate.send_replace(true);
	}

	pub fn switch_requests(&self) -> Vec<u64> {
		self.ledger().switch_requests.clone()
	}

	/// Number of `eth_sendTransaction` requests, rejected ones included
	pub fn sent_transactions(&self) -> usize {
		self.ledger().sent_transactions
	}

	pub fn balance_reads(&self) -> usize {
		self.ledger().balance_reads
	}

	pub fn emit_wallet_event(&self, event: WalletEvent) {
		let _ = self.wallet_events.send(event);
	}

	/// Announce a new empty block
	pub fn mine_block(&self) {
		let number = {
			let mut ledger = self.ledger();
			ledger.block_number += 1;
			ledger.block_number
		};
		let _ = self.blocks.send(BlockHeader {
			number: U64::from(number),
			hash: Some(keccak256(number.to_be_bytes())),
		});
	}

	/// A deposit made by someone outside the test's wallet
	pub fn external_deposit(&self, depositor: Address, amount: U256) {
		let block_number = {
			let mut ledger = self.ledger();
			*ledger.deposits.entry(depositor).or_default() += amount;
			*ledger.balances.entry(self.vault).or_default() += amount;
			ledger.block_number
		};
		self.emit_vault_log(VaultEventKind::Deposited, depositor, amount, block_number, None);
	}

	/// Log subscriptions opened so far
	pub async fn wait_for_log_subscribers(&self, count: usize) {
		wait_for_count(&self.log_subscriptions, count).await;
	}

	/// Block subscriptions opened so far
	pub async fn wait_for_block_subscribers(&self, count: usize) {
		wait_for_count(&self.block_subscriptions, count).await;
	}

	/// Log subscriptions currently alive
	pub fn active_log_subscribers(&self) -> usize {
		self.logs.receiver_count()
	}

	async fn wait_for_read_gate(&self) {
		let mut gate = self.read_gate.subscribe();
		let _ = gate.wait_for(|open| *open).await;
	}

	fn emit_vault_log(
		&self,
		kind: VaultEventKind,
		depositor: Address,
		amount: U256,
		block_number: u64,
		transaction_hash: Option<B256>,
	) {
		let _ = self.logs.send(Log {
			address: self.vault,
			topics: vec![kind.topic(), depositor.into_word()],
			data: Bytes::from(amount.abi_encode()),
			block_number: Some(U64::from(block_number)),
			transaction_hash,
			removed: false,
		});
	}

	/// Apply a vault call from `from` and return whether it succeeded, with the log it emits.
	fn execute(
		ledger: &mut Ledger,
		vault: Address,
		from: Address,
		value: U256,
		data: &[u8],
	) -> Option<(VaultEventKind, U256)> {
		let selector: [u8; 4] = data.get(..4)?.try_into().ok()?;

		if selector == abi::depositCall::SELECTOR {
			if value.is_zero() {
				return None;
			}
			*ledger.balances.entry(from).or_default() -= value;
			*ledger.balances.entry(vault).or_default() += value;
			*ledger.deposits.entry(from).or_default() += value;
			return Some((VaultEventKind::Deposited, value));
		}

		let amount = if selector == abi::withdrawCall::SELECTOR {
			abi::withdrawCall::abi_decode(data, false).ok()?.amount
		} else if selector == abi::withdrawAllCall::SELECTOR {
			ledger.deposits.get(&from).copied().unwrap_or_default()
		} else {
			return None;
		};
		let deposited = ledger.deposits.get(&from).copied().unwrap_or_default();
		if amount.is_zero() || amount > deposited {
			return None;
		}
		ledger.deposits.insert(from, deposited - amount);
		*ledger.balances.entry(vault).or_default() -= amount;
		*ledger.balances.entry(from).or_default() += amount;
		Some((VaultEventKind::Withdrew, amount))
	}
}

async fn wait_for_count(counter: &watch::Sender<usize>, count: usize) {
	let mut rx = counter.subscribe();
	tokio::time::timeout(WAIT_LIMIT, rx.wait_for(|opened| *opened >= count))
		.await
		.expect("subscription was never opened")
		.unwrap();
}

fn rpc_error(code: i64, message: &str) -> RpcError {
	RpcError::Rpc {
		code,
		message: message.to_string(),
	}
}

/// Stream the items of a broadcast channel that pass `accept`
fn stream_from<T, P>(rx: broadcast::Receiver<T>, accept: P) -> SubscriptionStream<T>
where
	T: Clone + Send + 'static,
	P: Fn(&T) -> bool + Send + Sync + 'static,
{
	stream::unfold((rx, accept), |(mut rx, accept)| async move {
		loop {
			match rx.recv().await {
				Ok(item) if accept(&item) => return Some((Ok(item), (rx, accept))),
				Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	})
	.boxed()
}

fn matches_filter(filter: &LogFilter, log: &Log) -> bool {
	log.address == filter.address
		&& filter.topics.iter().enumerate().all(|(position, accepted)| {
			accepted.is_empty()
				|| log
					.topics
					.get(position)
					.is_some_and(|topic| accepted.contains(topic))
		})
}

#[async_trait]
impl ChainProvider for MockChain {
	async fn chain_id(&self) -> Result<u64, RpcError> {
		Ok(TEST_CHAIN_ID)
	}

	async fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
		self.wait_for_read_gate().await;
		let mut ledger = self.ledger();
		ledger.balance_reads += 1;
		if ledger.failing_balances.contains(&address) {
			return Err(rpc_error(codes::SERVER_ERROR, "upstream request timed out"));
		}
		Ok(ledger.balances.get(&address).copied().unwrap_or_default())
	}

	async fn call(&self, request: &TransactionRequest) -> Result<Bytes, RpcError> {
		self.wait_for_read_gate().await;
		let ledger = self.ledger();
		if ledger.fail_vault_calls {
			return Err(rpc_error(codes::SERVER_ERROR, "upstream request timed out"));
		}

		let data = request.data.clone().unwrap_or_default();
		let call = match abi::balanceOfCall::abi_decode(&data, false) {
			Ok(call) if request.to == self.vault => call,
			_ => return Ok(Bytes::new()),
		};
		let balance = ledger.deposits.get(&call.user).copied().unwrap_or_default();
		Ok(Bytes::from(balance.abi_encode()))
	}

	async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, RpcError> {
		let ledger = self.ledger();
		if ledger.hold_receipts {
			return Ok(None);
		}
		Ok(ledger.receipts.get(&hash).cloned())
	}

	async fn subscribe_blocks(&self) -> Result<SubscriptionStream<BlockHeader>, RpcError> {
		let rx = self.blocks.subscribe();
		self.block_subscriptions.send_modify(|opened| *opened += 1);
		Ok(stream_from(rx, |_| true))
	}

	async fn subscribe_logs(&self, filter: LogFilter) -> Result<SubscriptionStream<Log>, RpcError> {
		let rx = self.logs.subscribe();
		self.log_subscriptions.send_modify(|opened| *opened += 1);
		Ok(stream_from(rx, move |log| matches_filter(&filter, log)))
	}
}

#[async_trait]
impl WalletProvider for MockChain {
	async fn request_accounts(&self) -> Result<Vec<Address>, RpcError> {
		let ledger = self.ledger();
		if ledger.reject_access {
			return Err(rpc_error(codes::USER_REJECTED, "User rejected the request."));
		}
		Ok(ledger.accounts.clone())
	}

	async fn chain_id(&self) -> Result<u64, RpcError> {
		Ok(self.ledger().wallet_chain)
	}

	async fn switch_chain(&self, chain_id: u64) -> Result<(), RpcError> {
		let mut ledger = self.ledger();
		ledger.switch_requests.push(chain_id);
		if ledger.reject_switch {
			return Err(rpc_error(codes::USER_REJECTED, "User rejected the request."));
		}
		ledger.wallet_chain = chain_id;
		Ok(())
	}

	async fn send_transaction(&self, request: TransactionRequest) -> Result<B256, RpcError> {
		let (hash, block_number, emitted, from) = {
			let mut ledger = self.ledger();
			ledger.sent_transactions += 1;
			if ledger.reject_signatures {
				return Err(rpc_error(
					codes::USER_REJECTED,
					"User denied transaction signature.",
				));
			}

			let from = request.from.unwrap_or(self.account);
			let value = request.value.unwrap_or_default();
			let balance = ledger.balances.get(&from).copied().unwrap_or_default();
			if value > balance {
				return Err(rpc_error(
					codes::SERVER_ERROR,
					"insufficient funds for gas * price + value",
				));
			}

			ledger.block_number += 1;
			let block_number = ledger.block_number;
			let hash = keccak256(
				[from.as_slice(), &(ledger.sent_transactions as u64).to_be_bytes()[..]].concat(),
			);
			let data = request.data.clone().unwrap_or_default();
			let emitted = if request.to == self.vault {
				Self::execute(&mut ledger, self.vault, from, value, &data)
			} else {
				None
			};

			ledger.receipts.insert(
				hash,
				TransactionReceipt {
					transaction_hash: hash,
					block_number: Some(U64::from(block_number)),
					status: Some(U64::from(u64::from(emitted.is_some()))),
				},
			);
			(hash, block_number, emitted, from)
		};

		if let Some((kind, amount)) = emitted {
			self.emit_vault_log(kind, from, amount, block_number, Some(hash));
		}
		Ok(hash)
	}

	fn subscribe_changes(&self) -> broadcast::Receiver<WalletEvent> {
		self.wallet_events.subscribe()
	}
}
