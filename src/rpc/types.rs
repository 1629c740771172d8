//! Types for JSON-RPC integration with an EVM node

use alloy_primitives::{Address, B256, Bytes, U64, U256};
use serde::{Deserialize, Serialize};

/// JSON-RPC error codes the client reacts to.
pub mod codes {
	/// EIP-1193: the user rejected the request.
	pub const USER_REJECTED: i64 = 4001;
	/// EIP-3326: the requested chain has not been added to the wallet.
	pub const UNRECOGNIZED_CHAIN: i64 = 4902;
	/// Geth-style revert code carried by `eth_call`/`eth_estimateGas` failures.
	pub const EXECUTION_REVERTED: i64 = 3;
	/// Generic server error; nodes report insufficient funds under this code.
	pub const SERVER_ERROR: i64 = -32000;
	/// The node does not implement the method.
	pub const METHOD_NOT_FOUND: i64 = -32601;
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JsonRpcResponse {
	#[serde(default)]
	pub result: serde_json::Value,
	pub error: Option<JsonRpcErrorObject>,
}

/// The `error` member of a failed JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
	pub code: i64,
	pub message: String,
	#[serde(default)]
	pub data: Option<serde_json::Value>,
}

/// Push message delivered on a WebSocket subscription.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubscriptionNotification<T> {
	pub method: String,
	pub params: SubscriptionParams<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubscriptionParams<T> {
	pub subscription: String,
	pub result: T,
}

/// Transaction request as accepted by `eth_call` and `eth_sendTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
	/// Sender; required for `eth_sendTransaction`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub from: Option<Address>,
	/// Target contract.
	pub to: Address,
	/// Native value attached to the call, in wei.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub value: Option<U256>,
	/// ABI-encoded calldata.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Bytes>,
}

/// Receipt returned once a transaction has been included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
	pub transaction_hash: B256,
	pub block_number: Option<U64>,
	/// `0x1` on success, `0x0` when execution reverted. Absent on pre-Byzantium chains.
	#[serde(default)]
	pub status: Option<U64>,
}

impl TransactionReceipt {
	/// Whether the transaction executed without reverting
	pub fn succeeded(&self) -> bool {
		self.status.is_none_or(|status| status == U64::from(1))
	}

	pub fn block_number(&self) -> Option<u64> {
		self.block_number.map(|number| number.to::<u64>())
	}
}

/// Header pushed by the `newHeads` subscription. Only the fields the sync layer reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
	pub number: U64,
	#[serde(default)]
	pub hash: Option<B256>,
}

/// Contract log as returned by `eth_getLogs` and the `logs` subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
	pub address: Address,
	pub topics: Vec<B256>,
	pub data: Bytes,
	#[serde(default)]
	pub block_number: Option<U64>,
	#[serde(default)]
	pub transaction_hash: Option<B256>,
	/// Set when the log was dropped by a reorg.
	#[serde(default)]
	pub removed: bool,
}

/// Filter for the `logs` subscription.
///
/// `topics` follows the node's positional semantics: one entry per topic position, each entry
/// an OR-list of accepted values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFilter {
	pub address: Address,
	pub topics: Vec<Vec<B256>>,
}

/// Error types for node transport and JSON-RPC failures
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
	#[error("JSON-RPC error {code}: {message}")]
	Rpc { code: i64, message: String },

	#[error("No data returned")]
	NoData,

	#[error("WebSocket error: {0}")]
	WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("Subscription error: {0}")]
	SubscriptionError(String),
}

impl RpcError {
	/// JSON-RPC error code, when the node answered with an error object
	pub fn code(&self) -> Option<i64> {
		match self {
			RpcError::Rpc { code, .. } => Some(*code),
			_ => None,
		}
	}

	/// Whether the wallet reported that the user declined the request
	pub fn is_user_rejection(&self) -> bool {
		self.code() == Some(codes::USER_REJECTED)
	}
}

impl From<JsonRpcErrorObject> for RpcError {
	fn from(error: JsonRpcErrorObject) -> Self {
		RpcError::Rpc {
			code: error.code,
			message: error.message,
		}
	}
}
