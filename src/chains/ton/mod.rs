//! TON DVN adapter
//!
//! The configured address may be the DVN itself or a proxy in front of it;
//! proxies are resolved through their first admin. Signer changes replace
//! the whole verifier dictionary, so the current one is read first.

pub mod address;
pub mod cell;
pub mod client;
pub mod dict;
pub mod layout;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use self::address::TonAddress;
use self::cell::Cell;
use self::client::ContractStateReader;
use self::dict::Dict256;
use self::layout::{opcode, DvnStorage, OP_SET_QUORUM, OP_SET_VERIFIERS};
use super::{call_data_bytes, operation_params, role_unsupported, ChainAdapter};
use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{CallData, ChainFamily, ChainTarget, Digest, GovernanceOperation};
use crate::utils::crypto::{parse_word, to_hex_prefixed};
use crate::log_info;

pub struct TonAdapter {
    reader: Arc<dyn ContractStateReader>,
}

impl TonAdapter {
    pub fn new(reader: Arc<dyn ContractStateReader>) -> Self {
        Self { reader }
    }

    /// DVN address behind `target`, following a proxy when there is one
    async fn resolve_dvn(&self, target: &TonAddress) -> GovernanceResult<(TonAddress, DvnStorage)> {
        let storage = self.reader.storage(target).await?;
        let dvn = match layout::proxy_admin(&storage)? {
            Some(admin) => {
                log_info!("ton", "Resolved proxy to DVN", proxy = target, dvn = admin);
                admin
            }
            None => return Ok((*target, DvnStorage::decode(&storage)?)),
        };
        let storage = self.reader.storage(&dvn).await?;
        Ok((dvn, DvnStorage::decode(&storage)?))
    }
}

/// Verifier set after adding or removing `signer`. Invalid changes fail
/// here, before any message is built.
pub fn apply_signer_change(current: &Dict256, signer: [u8; 32], active: bool, dvn: &TonAddress) -> GovernanceResult<Dict256> {
    let label = to_hex_prefixed(&signer);
    let mut next = current.clone();

    if active {
        if next.contains_key(&signer) {
            return Err(GovernanceError::state_invariant(format!("{} is already a signer of {}", label, dvn)));
        }
        next.insert(signer, Arc::new(Cell::empty()));
    } else {
        if !next.contains_key(&signer) {
            return Err(GovernanceError::state_invariant(format!("{} is not a signer of {}", label, dvn)));
        }
        next.remove(&signer);
        if next.is_empty() {
            return Err(GovernanceError::state_invariant(format!(
                "Should not remove the last existing signer of {}",
                dvn
            )));
        }
    }
    Ok(next)
}

#[async_trait]
impl ChainAdapter for TonAdapter {
    fn family(&self) -> ChainFamily {
        ChainFamily::Ton
    }

    async fn build_call_data(&self, operation: &GovernanceOperation, target: &ChainTarget) -> GovernanceResult<CallData> {
        if let GovernanceOperation::SetRole { .. } = operation {
            return Err(role_unsupported(ChainFamily::Ton));
        }

        let configured: TonAddress = target.contract_address.parse()?;
        let (dvn, storage) = self.resolve_dvn(&configured).await?;

        let message = match operation {
            GovernanceOperation::SetSigner { signer_address, active } => {
                let signer = parse_word(signer_address)?;
                let verifiers = apply_signer_change(&storage.verifiers, signer, *active, &dvn)?;
                layout::set_dict_message(
                    storage.set_verifiers_nonce,
                    opcode(OP_SET_VERIFIERS),
                    &dvn,
                    &verifiers,
                )?
            }
            GovernanceOperation::SetQuorum { new_quorum } => layout::set_quorum_message(
                storage.set_quorum_nonce,
                opcode(OP_SET_QUORUM),
                *new_quorum,
                &dvn,
            )?,
            GovernanceOperation::SetRole { .. } => return Err(role_unsupported(ChainFamily::Ton)),
        };

        Ok(CallData::Bytes(message.hash().to_vec()))
    }

    /// The message cell hash already commits to the nonce and target
    async fn hash_call_data(&self, _target: &ChainTarget, _expiration: u64, call_data: &CallData) -> GovernanceResult<Digest> {
        let bytes = call_data_bytes(call_data, ChainFamily::Ton)?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| GovernanceError::invalid_input("TON call-data must be a 32-byte cell hash"))?;
        Ok(Digest(hash))
    }

    fn output_call_data(&self, operation: &GovernanceOperation, _call_data: &CallData) -> GovernanceResult<Value> {
        Ok(operation_params(operation))
    }
}
