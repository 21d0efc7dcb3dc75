//! TON contract state over the toncenter v2 JSON-RPC API

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

use super::address::TonAddress;
use super::cell::Cell;
use crate::error::{GovernanceError, GovernanceResult};
use crate::utils::http::JsonRpcClient;

/// Query parameter some provider URLs carry for the v3 indexer
const V3_ENDPOINT_PARAM: &str = "v3-endpoint";

/// Storage getter exposed by every DVN-side contract
pub const STORAGE_GETTER: &str = "getContractStorage";

/// Derive the JSON-RPC endpoint from a provider URL: drop the v3 hint and
/// append `/jsonRPC` to the path
pub fn json_rpc_url(provider: &Url) -> GovernanceResult<Url> {
    let mut url = provider.clone();
    let kept: Vec<(String, String)> = provider
        .query_pairs()
        .filter(|(k, _)| k != V3_ENDPOINT_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = format!("{}/jsonRPC", provider.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

#[async_trait]
pub trait ContractStateReader: Send + Sync {
    /// Root cell returned by the contract's storage getter
    async fn storage(&self, address: &TonAddress) -> GovernanceResult<Arc<Cell>>;
}

#[derive(Debug, Deserialize)]
struct RunGetMethodResult {
    exit_code: i64,
    #[serde(default)]
    stack: Vec<(String, Value)>,
}

pub struct ToncenterClient {
    rpc: JsonRpcClient,
}

impl ToncenterClient {
    pub fn new(url: Url) -> GovernanceResult<Self> {
        Ok(Self { rpc: JsonRpcClient::new(url)? })
    }
}

#[async_trait]
impl ContractStateReader for ToncenterClient {
    async fn storage(&self, address: &TonAddress) -> GovernanceResult<Arc<Cell>> {
        let result = self
            .rpc
            .call(
                "runGetMethod",
                json!({"address": address.to_raw(), "method": STORAGE_GETTER, "stack": []}),
            )
            .await?;

        let parsed: RunGetMethodResult = serde_json::from_value(result)?;
        if parsed.exit_code != 0 {
            return Err(GovernanceError::rpc(format!(
                "{} on {} exited with code {}",
                STORAGE_GETTER, address, parsed.exit_code
            )));
        }

        let boc = match parsed.stack.first() {
            Some((kind, entry)) if kind == "cell" => entry
                .get("bytes")
                .and_then(Value::as_str)
                .ok_or_else(|| GovernanceError::rpc("Storage cell entry has no bytes"))?,
            _ => return Err(GovernanceError::rpc(format!("{} did not return a cell", STORAGE_GETTER))),
        };
        Ok(Cell::from_boc(&BASE64.decode(boc)?)?)
    }
}
