//!
//! JSON-RPC client for EVM nodes with WebSocket subscriptions.
//!
//! Requests are posted over HTTP. Subscriptions open a dedicated WebSocket per stream, perform
//! the `eth_subscribe` handshake and then yield every `eth_subscription` push for that id.
//! All methods are async and designed for use with Tokio.

use super::types::*;
use crate::chain::{ChainProvider, SubscriptionStream};

use alloy_primitives::{Address, B256, Bytes, U64, U256};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info};

/// EVM JSON-RPC client
#[derive(Clone)]
pub struct JsonRpcClient {
	/// The underlying HTTP client for requests.
	http_client: Client,
	/// HTTP endpoint of the node.
	rpc_url: String,
	/// WebSocket endpoint of the node, used for subscriptions.
	ws_url: String,
	/// Request id counter shared by all clones.
	next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
	/// Create a new client.
	///
	/// # Arguments
	/// * `rpc_url` - The HTTP endpoint for requests.
	/// * `ws_url` - The WebSocket endpoint for subscriptions.
	pub fn new(rpc_url: String, ws_url: String) -> Result<Self, RpcError> {
		let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

		Ok(Self {
			http_client,
			rpc_url,
			ws_url,
			next_id: Arc::new(AtomicU64::new(1)),
		})
	}

	fn next_id(&self) -> u64 {
		self.next_id.fetch_add(1, Ordering::Relaxed)
	}

	/// Execute a JSON-RPC request.
	///
	/// # Arguments
	/// * `method` - The JSON-RPC method name.
	/// * `params` - Positional parameters as a JSON array.
	///
	/// # Returns
	/// The decoded `result` member, or an `RpcError` if the request or decoding fails.
	/// A `null` result decodes into `Option::None` for optional targets.
	pub async fn request<T: DeserializeOwned>(
		&self,
		method: &str,
		params: Value,
	) -> Result<T, RpcError> {
		let id = self.next_id();
		let request_body = json!({
			"jsonrpc": "2.0",
			"id": id,
			"method": method,
			"params": params,
		});

		debug!(method, id, "Sending JSON-RPC request");

		let response = self
			.http_client
			.post(&self.rpc_url)
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await?
			.error_for_status()?;

		let response: JsonRpcResponse = response.json().await?;

		if let Some(error) = response.error {
			debug!(method, id, code = error.code, "JSON-RPC request failed: {}", error.message);
			return Err(error.into());
		}

		Ok(serde_json::from_value(response.result)?)
	}

	/// Open an `eth_subscribe` stream.
	///
	/// # Arguments
	/// * `params` - The `eth_subscribe` parameters, e.g. `["newHeads"]`.
	///
	/// # Returns
	/// A pinned async stream of decoded pushes. Each item is either a result or an error.
	///
	/// # Errors
	/// Returns `RpcError` if the WebSocket connection or the subscription handshake fails.
	pub async fn subscribe<T>(&self, params: Value) -> Result<SubscriptionStream<T>, RpcError>
	where
		T: DeserializeOwned + Send + 'static,
	{
		debug!("Attempting WebSocket connection to: {}", self.ws_url);

		let (ws_stream, response) = connect_async(self.ws_url.as_str()).await?;
		debug!(
			"WebSocket connection established, response status: {}",
			response.status()
		);
		let (mut ws_sender, mut ws_receiver) = ws_stream.split();

		let subscribe_message = json!({
			"jsonrpc": "2.0",
			"id": self.next_id(),
			"method": "eth_subscribe",
			"params": params.clone(),
		});
		ws_sender
			.send(Message::Text(subscribe_message.to_string()))
			.await?;

		// Wait for the subscription id
		let subscription_id = loop {
			let Some(msg) = ws_receiver.next().await else {
				return Err(RpcError::SubscriptionError(
					"Connection closed before subscription was acknowledged".to_string(),
				));
			};
			match msg? {
				Message::Text(text) => {
					let response: JsonRpcResponse = serde_json::from_str(&text)?;
					if let Some(error) = response.error {
						return Err(error.into());
					}
					match response.result {
						Value::String(id) => break id,
						_ => {
							return Err(RpcError::SubscriptionError(
								"Subscription not acknowledged".to_string(),
							));
						}
					}
				}
				Message::Ping(_) | Message::Pong(_) => continue,
				_ => {
					return Err(RpcError::SubscriptionError(
						"Unexpected message type during handshake".to_string(),
					));
				}
			}
		};

		info!("Established subscription {} for {}", subscription_id, params);

		let stream = ws_receiver.filter_map(move |msg| {
			let subscription_id = subscription_id.clone();
			async move {
				match msg {
					Ok(Message::Text(text)) => {
						let parsed: Value = match serde_json::from_str(&text) {
							Ok(parsed) => parsed,
							Err(e) => return Some(Err(RpcError::JsonError(e))),
						};
						if parsed.get("method").and_then(|m| m.as_str()) != Some("eth_subscription") {
							debug!("Ignoring non-subscription message: {}", text);
							return None;
						}
						match serde_json::from_value::<SubscriptionNotification<T>>(parsed) {
							Ok(notification) if notification.params.subscription == subscription_id => {
								Some(Ok(notification.params.result))
							}
							Ok(notification) => {
								debug!(
									"Ignoring push for foreign subscription {}",
									notification.params.subscription
								);
								None
							}
							Err(e) => {
								error!("Failed to deserialize subscription push: {}", e);
								Some(Err(RpcError::JsonError(e)))
							}
						}
					}
					Ok(Message::Close(frame)) => Some(Err(RpcError::SubscriptionError(format!(
						"Subscription closed by node: {:?}",
						frame
					)))),
					Ok(_) => None,
					Err(e) => Some(Err(RpcError::WebSocketError(e))),
				}
			}
		});

		Ok(Box::pin(stream))
	}
}

#[async_trait::async_trait]
impl ChainProvider for JsonRpcClient {
	async fn chain_id(&self) -> Result<u64, RpcError> {
		let chain_id: U64 = self.request("eth_chainId", json!([])).await?;
		Ok(chain_id.to::<u64>())
	}

	async fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
		self.request("eth_getBalance", json!([address, "latest"]))
			.await
	}

	async fn call(&self, request: &TransactionRequest) -> Result<Bytes, RpcError> {
		self.request("eth_call", json!([request, "latest"])).await
	}

	async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, RpcError> {
		self.request("eth_getTransactionReceipt", json!([hash]))
			.await
	}

	async fn subscribe_blocks(&self) -> Result<SubscriptionStream<BlockHeader>, RpcError> {
		self.subscribe(json!(["newHeads"])).await
	}

	async fn subscribe_logs(&self, filter: LogFilter) -> Result<SubscriptionStream<Log>, RpcError> {
		self.subscribe(json!(["logs", filter])).await
	}
}
