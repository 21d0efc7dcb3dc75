//! Chain adapters
//!
//! Every supported chain family encodes the governance instruction and
//! hashes it its own way. Adapters are picked once per target from its
//! `ChainFamily` and never re-dispatched by chain name afterwards.
//!
//! | Family    | Call-data                        | Digest                                   |
//! |-----------|----------------------------------|------------------------------------------|
//! | EVM       | ABI function call                | keccak(packed vid, target, exp, data)    |
//! | Solana    | program instruction (state diff) | keccak(borsh execute-transaction digest) |
//! | Move VM   | name hash ++ args                | keccak(data ++ vid ++ exp)               |
//! | TON       | cell hash (state diff)           | the cell hash itself                     |
//! | Starknet  | structured call                  | keccak(vid, felt target, u256 exp, ...)  |

pub mod evm;
pub mod move_vm;
pub mod solana;
pub mod starknet;
pub mod ton;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{GovernanceError, GovernanceResult};
use crate::registry::Registry;
use crate::signer::SigningRequest;
use crate::types::{CallData, ChainFamily, ChainTarget, Digest, GovernanceOperation};

pub use evm::EvmAdapter;
pub use move_vm::MoveVmAdapter;
pub use solana::SolanaAdapter;
pub use starknet::StarknetAdapter;
pub use ton::TonAdapter;

/// Per-family call-data encoding and canonical hashing
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn family(&self) -> ChainFamily;

    /// Encode `operation` for `target`. Solana and TON read live state here.
    async fn build_call_data(&self, operation: &GovernanceOperation, target: &ChainTarget) -> GovernanceResult<CallData>;

    /// Hash call-data together with the replay-protection fields
    async fn hash_call_data(&self, target: &ChainTarget, expiration: u64, call_data: &CallData) -> GovernanceResult<Digest>;

    /// The 32 bytes signers actually sign
    fn signing_message(&self, digest: &Digest) -> [u8; 32] {
        *digest.as_bytes()
    }

    /// Offset added to the ECDSA recovery id
    fn recovery_offset(&self) -> u8 {
        0
    }

    /// Call-data as written to the output file
    fn output_call_data(&self, _operation: &GovernanceOperation, call_data: &CallData) -> GovernanceResult<Value> {
        Ok(serde_json::to_value(call_data)?)
    }

    fn signing_request(&self, target: &ChainTarget, digest: &Digest) -> SigningRequest {
        SigningRequest {
            message: self.signing_message(digest),
            recovery_offset: self.recovery_offset(),
            key_scheme: target.key_scheme,
        }
    }
}

/// Build the adapter for a resolved target. RPC-backed families take their
/// provider URL from the registry.
pub fn adapter_for(target: &ChainTarget, registry: &Registry) -> GovernanceResult<Arc<dyn ChainAdapter>> {
    let adapter: Arc<dyn ChainAdapter> = match target.family {
        ChainFamily::Evm => Arc::new(EvmAdapter),
        ChainFamily::MoveVm => Arc::new(MoveVmAdapter),
        ChainFamily::Starknet => Arc::new(StarknetAdapter),
        ChainFamily::Solana => {
            let url = registry.provider_url(&target.chain_name)?;
            Arc::new(SolanaAdapter::new(Arc::new(solana::RpcAccountReader::new(url)?)))
        }
        ChainFamily::Ton => {
            let url = ton::client::json_rpc_url(&registry.provider_url(&target.chain_name)?)?;
            Arc::new(TonAdapter::new(Arc::new(ton::client::ToncenterClient::new(url)?)))
        }
    };
    Ok(adapter)
}

/// Raw bytes of a non-structured call-data
pub(crate) fn call_data_bytes(call_data: &CallData, family: ChainFamily) -> GovernanceResult<&[u8]> {
    call_data
        .as_bytes()
        .ok_or_else(|| GovernanceError::invalid_input(format!("{} call-data must be raw bytes", family)))
}

/// Role grants only exist on the EVM DVN
pub(crate) fn role_unsupported(family: ChainFamily) -> GovernanceError {
    GovernanceError::unsupported(format!("Role changes are only supported on EVM chains, not {}", family))
}

/// Operation parameters in place of call-data, for families whose
/// submitters rebuild the call themselves
pub(crate) fn operation_params(operation: &GovernanceOperation) -> Value {
    match operation {
        GovernanceOperation::SetSigner { signer_address, active } => json!({
            "signerAddress": signer_address,
            "shouldRevoke": !active,
        }),
        GovernanceOperation::SetQuorum { new_quorum } => json!({ "newQuorum": new_quorum }),
        GovernanceOperation::SetRole { account, grant, .. } => json!({
            "address": account,
            "grant": grant,
        }),
    }
}
