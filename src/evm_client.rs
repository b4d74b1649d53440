//! EVM Client Module
//!
//! This module provides a client for communicating with an EVM-compatible blockchain
//! node via its JSON-RPC API. It is the only place that talks to the node: every
//! call either returns a decoded result or an [`RpcError`], and never retries.
//! Retry policy belongs to the reconciler loop.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// Failure of a single JSON-RPC call.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Network failure or timeout talking to the node, or a non-success HTTP status
    #[error("transport failure calling {method}: {message}")]
    Transport { method: String, message: String },
    /// The response body could not be decoded into the expected shape
    #[error("decode failure for {method}: {message}")]
    Decode { method: String, message: String },
    /// The node answered with a JSON-RPC error object
    #[error("JSON-RPC error for {method}: {message} (code: {code})")]
    Node {
        method: String,
        code: i64,
        message: String,
    },
    /// The node answered with a null result (e.g. a block it does not serve yet)
    #[error("no result in {method} response")]
    MissingResult { method: String },
}

impl RpcError {
    /// True for network-level failures, false for malformed or empty answers.
    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Transport { .. })
    }
}

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Transaction entry of a block fetched with full transaction objects.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmBlockTransaction {
    /// Transaction hash
    pub hash: String,
    /// Sender address
    pub from: String,
    /// Recipient address (None for contract creation)
    #[serde(default)]
    pub to: Option<String>,
    /// Transferred value in wei (hex quantity)
    pub value: String,
}

/// Block returned by `eth_getBlockByNumber` with `include full transactions = true`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmBlock {
    /// Block number (hex quantity)
    #[serde(default)]
    pub number: Option<String>,
    /// Block hash
    #[serde(default)]
    pub hash: Option<String>,
    /// Full transaction objects
    #[serde(default)]
    pub transactions: Vec<EvmBlockTransaction>,
}

// ============================================================================
// EVM CLIENT IMPLEMENTATION
// ============================================================================

/// Client for communicating with EVM-compatible blockchain nodes via JSON-RPC
#[derive(Debug, Clone)]
pub struct EvmClient {
    /// HTTP client for making requests
    client: Client,
    /// Endpoint URL of the EVM node (e.g., "http://127.0.0.1:8545")
    base_url: String,
}

impl EvmClient {
    /// Creates a new EVM client for the given node URL
    ///
    /// # Arguments
    ///
    /// * `node_url` - Endpoint URL of the EVM node
    /// * `timeout` - Per-request timeout
    ///
    /// # Returns
    ///
    /// * `Ok(EvmClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create client
    pub fn new(node_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: node_url.to_string(),
        })
    }

    /// Issues one JSON-RPC call and decodes its `result`.
    ///
    /// Transport errors, non-2xx statuses, undecodable bodies, error payloads and
    /// null results are all reported as [`RpcError`].
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport {
                method: method.to_string(),
                message: format!("request to {} failed: {}", self.base_url, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Transport {
                method: method.to_string(),
                message: format!("{} returned HTTP {}", self.base_url, status),
            });
        }

        let body = response.bytes().await.map_err(|e| RpcError::Transport {
            method: method.to_string(),
            message: format!("failed to read response body from {}: {}", self.base_url, e),
        })?;

        let response: JsonRpcResponse<T> =
            serde_json::from_slice(&body).map_err(|e| RpcError::Decode {
                method: method.to_string(),
                message: e.to_string(),
            })?;

        if let Some(error) = response.error {
            return Err(RpcError::Node {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        response.result.ok_or_else(|| RpcError::MissingResult {
            method: method.to_string(),
        })
    }

    /// Gets the current block number via `eth_blockNumber`
    ///
    /// # Returns
    ///
    /// * `Ok(u64)` - Current block number
    /// * `Err(RpcError)` - Failed to query or parse the block number
    pub async fn get_block_number(&self) -> Result<u64, RpcError> {
        let method = "eth_blockNumber";
        let block_number_hex: String = self.call(method, vec![]).await?;

        u64::from_str_radix(
            block_number_hex
                .strip_prefix("0x")
                .unwrap_or(&block_number_hex),
            16,
        )
        .map_err(|e| RpcError::Decode {
            method: method.to_string(),
            message: format!("invalid block number '{}': {}", block_number_hex, e),
        })
    }

    /// Fetches one block with full transaction objects via `eth_getBlockByNumber`
    ///
    /// # Arguments
    ///
    /// * `height` - Block height
    ///
    /// # Returns
    ///
    /// * `Ok(EvmBlock)` - Block with its transactions
    /// * `Err(RpcError)` - Failed to fetch the block, or the node has no block at this height
    pub async fn get_block_by_number(&self, height: u64) -> Result<EvmBlock, RpcError> {
        let params = vec![
            serde_json::json!(format!("0x{:x}", height)),
            serde_json::json!(true),
        ];
        self.call("eth_getBlockByNumber", params).await
    }

    /// Returns the endpoint URL of this client
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
