//! EVM DVN adapter

use async_trait::async_trait;

use super::{call_data_bytes, ChainAdapter};
use crate::abi::{AbiEncoder, AbiType, AbiValue, DvnCall, U256};
use crate::error::GovernanceResult;
use crate::types::{CallData, ChainFamily, ChainTarget, Digest, GovernanceOperation};
use crate::utils::crypto::{keccak256, parse_evm_address, personal_sign_hash};

/// Recovery byte offset for Ethereum `v`
pub const EVM_RECOVERY_OFFSET: u8 = 27;

pub struct EvmAdapter;

/// `keccak256(abi.encodePacked(uint32 vid, address target, uint256 expiration, bytes callData))`
pub fn evm_digest(vid: u32, target: [u8; 20], expiration: u64, call_data: &[u8]) -> GovernanceResult<[u8; 32]> {
    let packed = AbiEncoder::encode_packed(
        &[
            AbiValue::Uint(U256::from(u64::from(vid))),
            AbiValue::Address(target),
            AbiValue::uint(expiration),
            AbiValue::Bytes(call_data.to_vec()),
        ],
        &[AbiType::Uint32, AbiType::Address, AbiType::Uint256, AbiType::Bytes],
    )?;
    Ok(keccak256(&packed))
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    async fn build_call_data(&self, operation: &GovernanceOperation, _target: &ChainTarget) -> GovernanceResult<CallData> {
        let encoded = match operation {
            GovernanceOperation::SetSigner { signer_address, active } => {
                DvnCall::set_signer(parse_evm_address(signer_address)?, *active)?
            }
            GovernanceOperation::SetQuorum { new_quorum } => DvnCall::set_quorum(*new_quorum)?,
            GovernanceOperation::SetRole { role_id, account, grant: true } => {
                DvnCall::grant_role(*role_id, parse_evm_address(account)?)?
            }
            GovernanceOperation::SetRole { role_id, account, grant: false } => {
                DvnCall::revoke_role(*role_id, parse_evm_address(account)?)?
            }
        };
        Ok(CallData::Bytes(encoded))
    }

    async fn hash_call_data(&self, target: &ChainTarget, expiration: u64, call_data: &CallData) -> GovernanceResult<Digest> {
        let bytes = call_data_bytes(call_data, ChainFamily::Evm)?;
        let contract = parse_evm_address(&target.contract_address)?;
        Ok(Digest(evm_digest(target.vid, contract, expiration, bytes)?))
    }

    /// The verifier recovers against the EIP-191 prefixed digest
    fn signing_message(&self, digest: &Digest) -> [u8; 32] {
        personal_sign_hash(digest.as_bytes())
    }

    fn recovery_offset(&self) -> u8 {
        EVM_RECOVERY_OFFSET
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::KnownSelectors;

    const TARGET: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn test_digest_vector() {
        let digest = evm_digest(30101, [0x11; 20], 1_700_000_000, &[0x12, 0x34]).unwrap();
        assert_eq!(
            hex::encode(digest),
            "097fb0709066ac2dc47215a7cc97cbcce13bae729d5c6be289df0165a94b73ca"
        );
    }

    #[tokio::test]
    async fn test_hash_call_data_matches_packed_digest() {
        let target = ChainTarget::new("arbitrum", TARGET, 30101);
        let digest = EvmAdapter
            .hash_call_data(&target, 1_700_000_000, &CallData::Bytes(vec![0x12, 0x34]))
            .await
            .unwrap();
        assert_eq!(
            digest.to_hex(),
            "0x097fb0709066ac2dc47215a7cc97cbcce13bae729d5c6be289df0165a94b73ca"
        );
    }

    #[tokio::test]
    async fn test_call_data_per_operation() {
        let target = ChainTarget::new("ethereum", TARGET, 101);

        let add = EvmAdapter
            .build_call_data(&GovernanceOperation::add_signer("0xdef0000000000000000000000000000000000def"), &target)
            .await
            .unwrap();
        let add = add.as_bytes().unwrap();
        assert_eq!(&add[..4], &KnownSelectors::SET_SIGNER);
        assert_eq!(add[67], 1);

        let quorum = EvmAdapter
            .build_call_data(&GovernanceOperation::set_quorum(2), &target)
            .await
            .unwrap();
        assert_eq!(&quorum.as_bytes().unwrap()[..4], &KnownSelectors::SET_QUORUM);

        let revoke = EvmAdapter
            .build_call_data(&GovernanceOperation::message_lib_role(TARGET, false), &target)
            .await
            .unwrap();
        assert_eq!(&revoke.as_bytes().unwrap()[..4], &KnownSelectors::REVOKE_ROLE);
    }

    #[tokio::test]
    async fn test_bad_signer_address_rejected() {
        let target = ChainTarget::new("ethereum", TARGET, 101);
        let err = EvmAdapter
            .build_call_data(&GovernanceOperation::add_signer("0x1234"), &target)
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidInput);
    }

    #[test]
    fn test_signing_message_is_prefixed() {
        let digest = Digest([0xab; 32]);
        assert_eq!(EvmAdapter.signing_message(&digest), personal_sign_hash(&[0xab; 32]));
        assert_ne!(EvmAdapter.signing_message(&digest), [0xab; 32]);
        assert_eq!(EvmAdapter.recovery_offset(), 27);
    }
}
