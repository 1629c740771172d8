//! JSON-RPC integration for EVM nodes
//!
//! This module provides the client and wire types for talking to an Ethereum-compatible node.
//! Plain requests go over HTTP; `eth_subscribe` streams (new heads, contract logs) go over a
//! WebSocket connection to the same node.

/// HTTP and WebSocket JSON-RPC client
mod client;
/// Wire types and transport errors
mod types;

pub use client::JsonRpcClient;
pub use types::*;
