//! Move VM DVN adapter (Aptos, Initia, Movement, Sui)

use async_trait::async_trait;
use serde_json::Value;

use super::{call_data_bytes, operation_params, role_unsupported, ChainAdapter};
use crate::error::GovernanceResult;
use crate::types::{CallData, ChainFamily, ChainTarget, Digest, GovernanceOperation};
use crate::utils::crypto::{decode_hex_lenient, keccak256, keccak256_concat};

pub struct MoveVmAdapter;

/// BCS length prefix
fn uleb128(mut value: usize, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// First four bytes of keccak256 over the BCS-serialized function name
pub fn function_hash(name: &str) -> [u8; 4] {
    let mut encoded = Vec::with_capacity(name.len() + 2);
    uleb128(name.len(), &mut encoded);
    encoded.extend_from_slice(name.as_bytes());

    let hash = keccak256(&encoded);
    [hash[0], hash[1], hash[2], hash[3]]
}

#[async_trait]
impl ChainAdapter for MoveVmAdapter {
    fn family(&self) -> ChainFamily {
        ChainFamily::MoveVm
    }

    async fn build_call_data(&self, operation: &GovernanceOperation, _target: &ChainTarget) -> GovernanceResult<CallData> {
        let mut encoded = Vec::new();
        match operation {
            GovernanceOperation::SetSigner { signer_address, active } => {
                encoded.extend_from_slice(&function_hash("set_dvn_signer"));
                encoded.extend_from_slice(&decode_hex_lenient(signer_address)?);
                encoded.push(u8::from(*active));
            }
            GovernanceOperation::SetQuorum { new_quorum } => {
                encoded.extend_from_slice(&function_hash("set_quorum"));
                encoded.extend_from_slice(&new_quorum.to_be_bytes());
            }
            GovernanceOperation::SetRole { .. } => return Err(role_unsupported(ChainFamily::MoveVm)),
        }
        Ok(CallData::Bytes(encoded))
    }

    async fn hash_call_data(&self, target: &ChainTarget, expiration: u64, call_data: &CallData) -> GovernanceResult<Digest> {
        let bytes = call_data_bytes(call_data, ChainFamily::MoveVm)?;
        Ok(Digest(keccak256_concat(&[
            bytes,
            &target.vid.to_be_bytes(),
            &expiration.to_be_bytes(),
        ])))
    }

    fn output_call_data(&self, operation: &GovernanceOperation, _call_data: &CallData) -> GovernanceResult<Value> {
        Ok(operation_params(operation))
    }
}
