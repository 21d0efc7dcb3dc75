//! Orchestrator
//!
//! Runs one pipeline per target chain, all of them concurrently:
//! build call-data, hash it, collect a signature from every signer
//! concurrently, assemble the quorum payload. Pipelines share nothing but
//! the read-only request.

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::chains::{adapter_for, ChainAdapter};
use crate::error::{GovernanceError, GovernanceResult};
use crate::quorum;
use crate::registry::Registry;
use crate::signer::SignerBackend;
use crate::types::{ChainTarget, Digest, FailurePolicy, GovernanceOperation, GovernanceRequest, QuorumPayload, Signature};
use crate::{log_debug, log_error, log_info};

const GRANT_ROLE_SIGNATURE: &str = "function grantRole(bytes32 _role, address _account)";
const REVOKE_ROLE_SIGNATURE: &str = "function revokeRole(bytes32 _role, address _account)";

/// Arguments a submitter passes to the DVN's execute entry point
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadArgs {
    pub target: String,
    pub signatures: QuorumPayload,
    pub call_data: Value,
    pub expiration: u64,
    pub vid: String,
}

/// Diagnostics kept next to the args
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadInfo {
    pub signatures: Vec<Signature>,
    pub hash_call_data: Digest,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainPayload {
    pub args: PayloadArgs,
    pub info: PayloadInfo,
}

/// Per-chain outcomes of one run, keyed by chain name
#[derive(Debug, Default)]
pub struct RunReport {
    pub results: BTreeMap<String, GovernanceResult<ChainPayload>>,
}

impl RunReport {
    pub fn record_failure(&mut self, chain: impl Into<String>, error: GovernanceError) {
        self.results.insert(chain.into(), Err(error));
    }

    pub fn failures(&self) -> impl Iterator<Item = (&String, &GovernanceError)> {
        self.results.iter().filter_map(|(chain, r)| r.as_ref().err().map(|e| (chain, e)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Output document. Under `Partial` every entry carries a status tag.
    pub fn to_json(&self, policy: FailurePolicy) -> GovernanceResult<Value> {
        let mut out = Map::new();
        for (chain, result) in &self.results {
            let entry = match (policy, result) {
                (FailurePolicy::AllOrNothing, Ok(payload)) => serde_json::to_value(payload)?,
                (FailurePolicy::AllOrNothing, Err(e)) => {
                    return Err(GovernanceError::internal(format!("Unreported failure for {}: {}", chain, e)));
                }
                (FailurePolicy::Partial, Ok(payload)) => {
                    let mut value = serde_json::to_value(payload)?;
                    if let Value::Object(fields) = &mut value {
                        fields.insert("status".into(), json!("ok"));
                    }
                    value
                }
                (FailurePolicy::Partial, Err(e)) => json!({ "status": "error", "error": e }),
            };
            out.insert(chain.clone(), entry);
        }
        Ok(Value::Object(out))
    }

    pub fn write(&self, path: &Path, policy: FailurePolicy) -> GovernanceResult<()> {
        let document = serde_json::to_string_pretty(&self.to_json(policy)?)?;
        std::fs::write(path, document)?;
        log_info!("orchestrator", "Output written", path = path.display(), chains = self.results.len());
        Ok(())
    }
}

pub struct Orchestrator {
    registry: Registry,
    signer: Arc<dyn SignerBackend>,
    adapters: HashMap<String, Arc<dyn ChainAdapter>>,
    failure_policy: FailurePolicy,
}

impl Orchestrator {
    pub fn new(registry: Registry, signer: Arc<dyn SignerBackend>) -> Self {
        Self {
            registry,
            signer,
            adapters: HashMap::new(),
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Use `adapter` for `chain` instead of the registry-built one
    pub fn with_adapter(mut self, chain: &str, adapter: Arc<dyn ChainAdapter>) -> Self {
        self.adapters.insert(chain.to_string(), adapter);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Resolve chain names against the registry. Under `AllOrNothing` the
    /// first unresolvable chain is returned as the error.
    pub fn resolve_targets(&self, chains: &[String]) -> GovernanceResult<(Vec<ChainTarget>, RunReport)> {
        let mut targets = Vec::with_capacity(chains.len());
        let mut unresolved = RunReport::default();
        for chain in chains {
            match self.registry.resolve_target(chain) {
                Ok(target) => targets.push(target),
                Err(e) if self.failure_policy == FailurePolicy::Partial => {
                    log_error!("orchestrator", "Chain skipped", chain = chain, error = e);
                    unresolved.record_failure(chain.clone(), e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok((targets, unresolved))
    }

    pub async fn run(&self, request: &GovernanceRequest) -> GovernanceResult<RunReport> {
        let mut report = RunReport::default();
        match self.failure_policy {
            FailurePolicy::AllOrNothing => {
                let pipelines = request.targets.iter().map(|target| async move {
                    let payload = self.run_chain(request, target).await?;
                    Ok::<_, GovernanceError>((target.chain_name.clone(), payload))
                });
                for (chain, payload) in try_join_all(pipelines).await? {
                    report.results.insert(chain, Ok(payload));
                }
            }
            FailurePolicy::Partial => {
                let pipelines = request.targets.iter().map(|target| async move {
                    let result = self.run_chain(request, target).await;
                    if let Err(e) = &result {
                        log_error!("orchestrator", "Chain failed", chain = target.chain_name, error = e);
                    }
                    (target.chain_name.clone(), result)
                });
                report.results.extend(join_all(pipelines).await);
            }
        }
        Ok(report)
    }

    async fn run_chain(&self, request: &GovernanceRequest, target: &ChainTarget) -> GovernanceResult<ChainPayload> {
        let adapter = match self.adapters.get(&target.chain_name) {
            Some(adapter) => adapter.clone(),
            None => adapter_for(target, &self.registry)?,
        };
        let chain = target.chain_name.as_str();

        let call_data = adapter.build_call_data(&request.operation, target).await?;
        log_debug!("orchestrator", "Call-data built", chain = chain, len = call_data.len());

        let digest = adapter.hash_call_data(target, request.expiration, &call_data).await?;
        log_debug!("orchestrator", "Digest computed", chain = chain, digest = digest);

        let signing_request = adapter.signing_request(target, &digest);
        let signatures = try_join_all(
            request
                .signers
                .iter()
                .map(|descriptor| self.signer.sign(descriptor, &signing_request)),
        )
        .await?;
        for s in &signatures {
            log_debug!("orchestrator", "Signature collected", chain = chain, signer = s.address);
        }

        let payload = quorum::assemble(&signatures, request.quorum, target.family)?;
        log_info!(
            "orchestrator",
            "Payload assembled",
            chain = chain,
            signatures = payload.signature_count(signatures.first().map_or(0, |s| s.signature.len()))
        );

        Ok(ChainPayload {
            args: PayloadArgs {
                target: target.contract_address.clone(),
                signatures: payload,
                call_data: adapter.output_call_data(&request.operation, &call_data)?,
                expiration: request.expiration,
                vid: target.vid.to_string(),
            },
            info: PayloadInfo {
                signatures,
                hash_call_data: digest,
                params: info_params(&request.operation, request.quorum, target.vid),
            },
        })
    }
}

/// Operation parameters echoed into the info block
fn info_params(operation: &GovernanceOperation, quorum: usize, vid: u32) -> Map<String, Value> {
    let value = match operation {
        GovernanceOperation::SetSigner { signer_address, active } => json!({
            "quorum": quorum,
            "signerAddress": signer_address,
            "shouldRevoke": !active,
        }),
        GovernanceOperation::SetQuorum { new_quorum } => json!({
            "oldQuorum": quorum,
            "newQuorum": new_quorum,
        }),
        GovernanceOperation::SetRole { account, grant, .. } => json!({
            "quorum": quorum,
            "address": account,
            "vId": vid,
            "accessSignature": if *grant { GRANT_ROLE_SIGNATURE } else { REVOKE_ROLE_SIGNATURE },
        }),
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::EvmAdapter;
    use crate::error::ErrorCode;
    use crate::signer::Signers;
    use crate::types::{CallData, ChainFamily, Environment, SignerDescriptor};
    use async_trait::async_trait;

    const HARDHAT: &str = "test test test test test test test test test test test junk";
    const DVN: &str = "0x1111111111111111111111111111111111111111";

    fn signers(count: usize) -> Vec<SignerDescriptor> {
        (0..count)
            .map(|i| SignerDescriptor::raw_mnemonic(HARDHAT, format!("m/44'/60'/0'/0/{}", i)))
            .collect()
    }

    fn registry() -> Registry {
        Registry::new(Environment::Mainnet)
            .with_dvn_address("ethereum", DVN)
            .with_dvn_address("arbitrum", DVN)
    }

    struct BrokenAdapter;

    #[async_trait]
    impl ChainAdapter for BrokenAdapter {
        fn family(&self) -> ChainFamily {
            ChainFamily::Evm
        }

        async fn build_call_data(&self, _: &GovernanceOperation, _: &ChainTarget) -> GovernanceResult<CallData> {
            Err(GovernanceError::rpc("provider down"))
        }

        async fn hash_call_data(&self, _: &ChainTarget, _: u64, _: &CallData) -> GovernanceResult<Digest> {
            Err(GovernanceError::rpc("provider down"))
        }
    }

    fn request(orchestrator: &Orchestrator, chains: &[&str], op: GovernanceOperation, quorum: usize) -> GovernanceRequest {
        let names: Vec<String> = chains.iter().map(|c| c.to_string()).collect();
        let (targets, _) = orchestrator.resolve_targets(&names).unwrap();
        GovernanceRequest::new(Environment::Mainnet, op, targets, quorum, 1_700_000_000_000, signers(5)).unwrap()
    }

    #[tokio::test]
    async fn test_evm_run_produces_sorted_quorum() {
        let orchestrator = Orchestrator::new(registry(), Arc::new(Signers::local()));
        let op = GovernanceOperation::add_signer("0xdef0000000000000000000000000000000000def");
        let req = request(&orchestrator, &["ethereum"], op, 3);

        let report = orchestrator.run(&req).await.unwrap();
        let payload = report.results["ethereum"].as_ref().unwrap();

        assert_eq!(payload.info.signatures.len(), 5);
        let QuorumPayload::Packed(bytes) = &payload.args.signatures else {
            panic!("expected packed signatures");
        };
        assert_eq!(bytes.len(), 3 * 65);

        let mut by_address = payload.info.signatures.clone();
        by_address.sort_by_key(|s| s.address.to_lowercase());
        let lowest: Vec<u8> = by_address.iter().take(3).flat_map(|s| s.signature.clone()).collect();
        assert_eq!(bytes, &lowest);
        assert!(by_address[0].address.eq_ignore_ascii_case("0x15d34AAf54267DB7D7c367839AAf71A00a2C6A65"));
        assert_eq!(payload.args.vid, req.targets[0].vid.to_string());
        assert_eq!(payload.info.params["quorum"], 3);
        assert_eq!(payload.info.params["shouldRevoke"], false);
    }

    #[tokio::test]
    async fn test_all_or_nothing_aborts() {
        let orchestrator = Orchestrator::new(registry(), Arc::new(Signers::local()))
            .with_adapter("arbitrum", Arc::new(BrokenAdapter));
        let req = request(&orchestrator, &["ethereum", "arbitrum"], GovernanceOperation::set_quorum(2), 1);

        let err = orchestrator.run(&req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Rpc);
    }

    #[tokio::test]
    async fn test_partial_records_each_chain() {
        let orchestrator = Orchestrator::new(registry(), Arc::new(Signers::local()))
            .with_adapter("arbitrum", Arc::new(BrokenAdapter))
            .with_failure_policy(FailurePolicy::Partial);
        let req = request(&orchestrator, &["ethereum", "arbitrum"], GovernanceOperation::set_quorum(2), 1);

        let report = orchestrator.run(&req).await.unwrap();
        assert!(report.has_failures());

        let json = report.to_json(FailurePolicy::Partial).unwrap();
        assert_eq!(json["ethereum"]["status"], "ok");
        assert_eq!(json["ethereum"]["info"]["oldQuorum"], 1);
        assert_eq!(json["ethereum"]["info"]["newQuorum"], 2);
        assert_eq!(json["arbitrum"]["status"], "error");
        assert_eq!(json["arbitrum"]["error"]["code"], "rpc");
    }

    #[test]
    fn test_partial_resolution_keeps_going() {
        let orchestrator = Orchestrator::new(registry(), Arc::new(Signers::local()))
            .with_failure_policy(FailurePolicy::Partial);
        let (targets, unresolved) = orchestrator
            .resolve_targets(&["ethereum".to_string(), "not-a-chain".to_string()])
            .unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(unresolved.results["not-a-chain"].as_ref().unwrap_err().code, ErrorCode::UnknownChain);

        let strict = Orchestrator::new(registry(), Arc::new(Signers::local()));
        assert!(strict.resolve_targets(&["not-a-chain".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_quorum_larger_than_signers() {
        let orchestrator = Orchestrator::new(registry(), Arc::new(Signers::local()));
        let req = request(&orchestrator, &["ethereum"], GovernanceOperation::set_quorum(2), 6);
        let err = orchestrator.run(&req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::QuorumTooLarge);
    }

    #[tokio::test]
    async fn test_role_info_and_repeatability() {
        let orchestrator = Orchestrator::new(registry(), Arc::new(Signers::local()))
            .with_adapter("ethereum", Arc::new(EvmAdapter));
        let op = GovernanceOperation::message_lib_role("0x2222222222222222222222222222222222222222", false);
        let req = request(&orchestrator, &["ethereum"], op, 2);

        let first = orchestrator.run(&req).await.unwrap().to_json(FailurePolicy::AllOrNothing).unwrap();
        let second = orchestrator.run(&req).await.unwrap().to_json(FailurePolicy::AllOrNothing).unwrap();
        assert_eq!(first, second);
        assert_eq!(first["ethereum"]["info"]["accessSignature"], REVOKE_ROLE_SIGNATURE);
        assert_eq!(first["ethereum"]["info"]["vId"], req.targets[0].vid);
    }
}
