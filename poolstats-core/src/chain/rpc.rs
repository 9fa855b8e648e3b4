//! Blocking JSON-RPC 2.0 client for a Solana-compatible endpoint.

use super::{ChainRpc, EpochInfo, EpochSchedule, RpcError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_RPC_ENDPOINT: &str = "https://api.mainnet-beta.solana.com";

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

pub struct JsonRpcClient {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl JsonRpcClient {
    /// Build a client for `endpoint`. `timeout` of `None` leaves requests unbounded.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, RpcError> {
        // blocking clients default to a 30s timeout; clear it unless asked for one
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn call<T: DeserializeOwned>(&self, method: &str) -> Result<T, RpcError> {
        debug!(endpoint = %self.endpoint, method, "rpc call");
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": [],
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                status: status.as_u16(),
            });
        }

        let envelope: RpcEnvelope<T> = resp
            .json()
            .map_err(|e| RpcError::Decode(format!("{method}: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(RpcError::Response {
                code: err.code,
                message: err.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| RpcError::Decode(format!("{method}: missing result")))
    }
}

impl ChainRpc for JsonRpcClient {
    fn epoch_schedule(&self) -> Result<EpochSchedule, RpcError> {
        self.call("getEpochSchedule")
    }

    fn epoch_info(&self) -> Result<EpochInfo, RpcError> {
        self.call("getEpochInfo")
    }
}
