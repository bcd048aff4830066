//! JSON-RPC client for the node and private execution environment (PXE).
//!
//! The platform is consumed as an opaque service: gas estimation, execution
//! profiling, transaction submission, contract deployment, account
//! registration, and authwit creation are all remote calls returning JSON.
//! `Connection` is constructed explicitly by the entry point and passed down;
//! nothing here is initialized at import time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::call::{AuthWitness, PreparedCall};
use crate::schema::{CircuitGateCount, GasSettings};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed rpc response: {0}")]
    Malformed(String),

    #[error("transaction {0} dropped from the mempool")]
    TxDropped(String),

    #[error("transaction reverted: {0}")]
    TxReverted(String),

    #[error("timed out waiting for transaction {0}")]
    Timeout(String),
}

/// Typed view of the platform's error taxonomy. The platform only exposes
/// message strings, so the substring matching is confined to `classify` and
/// callers branch on the kind instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BalanceTooLow,
    NotAuthorized,
    AssertionFailed,
    TxDropped,
    TxReverted,
    Timeout,
    Transport,
    Other,
}

impl ErrorKind {
    pub fn classify(message: &str) -> ErrorKind {
        let lower = message.to_ascii_lowercase();
        if lower.contains("balance too low") {
            ErrorKind::BalanceTooLow
        } else if lower.contains("not authorized") || lower.contains("unauthorized") {
            ErrorKind::NotAuthorized
        } else if lower.contains("assertion failed") {
            ErrorKind::AssertionFailed
        } else {
            ErrorKind::Other
        }
    }
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::TxDropped(_) => ErrorKind::TxDropped,
            ClientError::Timeout(_) => ErrorKind::Timeout,
            ClientError::Malformed(_) => ErrorKind::Other,
            ClientError::Rpc { message, .. } => ErrorKind::classify(message),
            ClientError::TxReverted(message) => match ErrorKind::classify(message) {
                ErrorKind::Other => ErrorKind::TxReverted,
                kind => kind,
            },
        }
    }
}

/// Which endpoint a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Node,
    Pxe,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub node_url: String,
    pub pxe_url: String,
    pub request_timeout: Duration,
    /// Receipt poll cadence while waiting for finality.
    pub poll_interval: Duration,
    /// Upper bound on one send-and-wait cycle.
    pub tx_wait_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            node_url: "http://localhost:8079".to_string(),
            pxe_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            tx_wait_timeout: Duration::from_secs(120),
        }
    }
}

impl ClientConfig {
    /// Endpoint URLs come from the environment (`NODE_URL`, `PXE_URL`);
    /// everything else keeps its default.
    pub fn from_env() -> Self {
        let mut config = ClientConfig::default();
        if let Ok(url) = std::env::var("NODE_URL") {
            config.node_url = url;
        }
        if let Ok(url) = std::env::var("PXE_URL") {
            config.pxe_url = url;
        }
        config
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Mined,
    Reverted,
    Dropped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
    pub status: TxStatus,
    pub block_number: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Live connection to one node + PXE pair.
pub struct Connection {
    http: reqwest::Client,
    config: ClientConfig,
    next_id: AtomicU64,
}

impl Connection {
    pub fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Connection {
            http,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Node => &self.config.node_url,
            Endpoint::Pxe => &self.config.pxe_url,
        }
    }

    pub async fn rpc(
        &self,
        endpoint: Endpoint,
        method: &str,
        params: Value,
    ) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "rpc request");
        let req = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let resp = self
            .http
            .post(self.url(endpoint))
            .json(&req)
            .send()
            .await?
            .error_for_status()?;
        let body: RpcResponse = resp.json().await?;
        if let Some(err) = body.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        body.result
            .ok_or_else(|| ClientError::Malformed(format!("{method}: missing result")))
    }

    fn parse<T: serde::de::DeserializeOwned>(method: &str, value: Value) -> Result<T, ClientError> {
        serde_json::from_value(value)
            .map_err(|e| ClientError::Malformed(format!("{method}: {e}")))
    }

    // -- opaque collaborators used by suite setup ---------------------------

    /// Deploy a contract artifact known to the PXE; returns its address.
    pub async fn deploy_contract(
        &self,
        artifact: &str,
        deployer: &str,
        init_args: Value,
    ) -> Result<String, ClientError> {
        let result = self
            .rpc(
                Endpoint::Pxe,
                "pxe_deployContract",
                json!({ "artifact": artifact, "deployer": deployer, "args": init_args }),
            )
            .await?;
        Self::parse("pxe_deployContract", result.get("address").cloned().unwrap_or(result))
    }

    /// Register a fresh account in the PXE's isolated store; returns its
    /// address.
    pub async fn register_account(&self, alias: &str) -> Result<String, ClientError> {
        let result = self
            .rpc(Endpoint::Pxe, "pxe_registerAccount", json!({ "alias": alias }))
            .await?;
        Self::parse("pxe_registerAccount", result.get("address").cloned().unwrap_or(result))
    }

    /// Ask the owner's wallet to sign a witness authorizing `caller` to
    /// perform `inner` on its behalf.
    pub async fn create_authwit(
        &self,
        owner: &str,
        caller: &str,
        inner: &PreparedCall,
    ) -> Result<AuthWitness, ClientError> {
        let result = self
            .rpc(
                Endpoint::Pxe,
                "pxe_createAuthWit",
                json!({ "owner": owner, "caller": caller, "call": inner }),
            )
            .await?;
        Self::parse::<String>("pxe_createAuthWit", result).map(AuthWitness)
    }

    /// Drop the per-run PXE store so reruns start from fresh state.
    pub async fn reset_store(&self) -> Result<(), ClientError> {
        self.rpc(Endpoint::Pxe, "pxe_resetStore", json!({})).await?;
        Ok(())
    }

    async fn tx_receipt(&self, tx_hash: &str) -> Result<TxReceipt, ClientError> {
        let result = self
            .rpc(Endpoint::Node, "node_getTxReceipt", json!([tx_hash]))
            .await?;
        Self::parse("node_getTxReceipt", result)
    }
}

/// The three operations the profiler drives, behind a seam so tests can
/// substitute an in-memory client.
#[async_trait]
pub trait ProfilerClient: Send + Sync {
    /// Estimate the gas the call would consume against current state.
    async fn estimate_gas(&self, call: &PreparedCall) -> Result<GasSettings, ClientError>;

    /// Full execution profile: one gate count per circuit invoked, in
    /// invocation order.
    async fn profile(&self, call: &PreparedCall) -> Result<Vec<CircuitGateCount>, ClientError>;

    /// Submit the transaction and block until it is mined. A clean
    /// simulation that reverts on submission is an error, not a result.
    async fn send_and_wait(&self, call: &PreparedCall) -> Result<TxReceipt, ClientError>;
}

#[async_trait]
impl ProfilerClient for Connection {
    async fn estimate_gas(&self, call: &PreparedCall) -> Result<GasSettings, ClientError> {
        let result = self
            .rpc(Endpoint::Node, "node_estimateGas", json!({ "call": call }))
            .await?;
        Self::parse("node_estimateGas", result)
    }

    async fn profile(&self, call: &PreparedCall) -> Result<Vec<CircuitGateCount>, ClientError> {
        let result = self
            .rpc(Endpoint::Pxe, "pxe_profileTx", json!({ "call": call }))
            .await?;
        let steps = result
            .get("executionSteps")
            .cloned()
            .ok_or_else(|| ClientError::Malformed("pxe_profileTx: missing executionSteps".to_string()))?;
        Self::parse("pxe_profileTx", steps)
    }

    async fn send_and_wait(&self, call: &PreparedCall) -> Result<TxReceipt, ClientError> {
        let result = self
            .rpc(Endpoint::Pxe, "pxe_sendTx", json!({ "call": call }))
            .await?;
        let tx_hash: String = Self::parse("pxe_sendTx", result)?;

        let mut waited = Duration::ZERO;
        loop {
            let receipt = self.tx_receipt(&tx_hash).await?;
            match receipt.status {
                TxStatus::Mined => return Ok(receipt),
                TxStatus::Reverted => {
                    let reason = receipt.error.unwrap_or_else(|| "unknown revert".to_string());
                    return Err(ClientError::TxReverted(reason));
                }
                TxStatus::Dropped => return Err(ClientError::TxDropped(tx_hash)),
                TxStatus::Pending => {
                    if waited >= self.config.tx_wait_timeout {
                        return Err(ClientError::Timeout(tx_hash));
                    }
                    tokio::time::sleep(self.config.poll_interval).await;
                    waited += self.config.poll_interval;
                }
            }
        }
    }
}
