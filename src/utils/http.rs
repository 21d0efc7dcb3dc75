//! HTTP plumbing shared by the RPC readers and cloud clients
//!
//! Provides:
//! - One client configuration (timeouts, keep-alive, user agent)
//! - A minimal JSON-RPC 2.0 caller

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

use crate::error::{GovernanceError, GovernanceResult};
use crate::log_debug;

/// Build the async HTTP client used for every outbound call
pub fn default_client() -> GovernanceResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .user_agent(concat!("dvn-governance/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GovernanceError::internal(format!("Failed to create HTTP client: {}", e)))
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 over HTTP POST
pub struct JsonRpcClient {
    client: Client,
    url: Url,
    request_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: Url) -> GovernanceResult<Self> {
        Ok(Self {
            client: default_client()?,
            url,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Call `method` and return its `result`; RPC-level errors become `Rpc` errors
    pub async fn call(&self, method: &str, params: Value) -> GovernanceResult<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        log_debug!("http", "JSON-RPC request", method = method, id = id);

        let request = JsonRpcRequest { jsonrpc: "2.0", id, method, params };
        let response = self.client.post(self.url.clone()).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GovernanceError::rpc(format!("{} returned HTTP {}", method, status)).with_details(body));
        }

        let parsed: JsonRpcResponse = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(GovernanceError::rpc(format!(
                "{} failed with code {}: {}",
                method, error.code, error.message
            )));
        }
        parsed
            .result
            .ok_or_else(|| GovernanceError::rpc(format!("{} returned no result", method)))
    }
}
