//! Starknet DVN adapter
//!
//! Call-data stays a typed `StarknetCall` until hashing so every field is
//! widened by its own Cairo type: `u32` vid, `felt252` target and
//! arguments, `u256` expiration.

use async_trait::async_trait;

use super::ChainAdapter;
use crate::abi::U256;
use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{CallData, ChainFamily, ChainTarget, Digest, GovernanceOperation, StarknetCall};
use crate::utils::crypto::{keccak256, keccak256_concat};

/// Field prime 2^251 + 17 * 2^192 + 1, big-endian
const STARK_PRIME: [u8; 32] = [
    0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
];

pub struct StarknetAdapter;

/// Entry-point selector: keccak256 of the name truncated to 250 bits
pub fn selector(name: &str) -> [u8; 32] {
    let mut hash = keccak256(name.as_bytes());
    hash[0] &= 0x03;
    hash
}

/// Hex or decimal felt as a 32-byte big-endian word
pub fn felt(value: &str) -> GovernanceResult<[u8; 32]> {
    let word = U256::parse(value)
        .map_err(|e| GovernanceError::invalid_input(format!("Invalid felt '{}': {}", value, e)))?
        .to_be_bytes();
    if word >= STARK_PRIME {
        return Err(GovernanceError::invalid_input(format!("Felt '{}' exceeds the field prime", value)));
    }
    Ok(word)
}

fn felt_u64(value: u64) -> [u8; 32] {
    U256::from(value).to_be_bytes()
}

#[async_trait]
impl ChainAdapter for StarknetAdapter {
    fn family(&self) -> ChainFamily {
        ChainFamily::Starknet
    }

    async fn build_call_data(&self, operation: &GovernanceOperation, _target: &ChainTarget) -> GovernanceResult<CallData> {
        let call = match operation {
            GovernanceOperation::SetSigner { signer_address, active } => {
                // validated now so a bad address fails before any signing
                felt(signer_address)?;
                StarknetCall::SetSigner { signer_address: signer_address.clone(), active: *active }
            }
            GovernanceOperation::SetQuorum { new_quorum } => StarknetCall::SetThreshold { threshold: *new_quorum },
            GovernanceOperation::SetRole { .. } => return Err(super::role_unsupported(ChainFamily::Starknet)),
        };
        Ok(CallData::Structured(call))
    }

    async fn hash_call_data(&self, target: &ChainTarget, expiration: u64, call_data: &CallData) -> GovernanceResult<Digest> {
        let CallData::Structured(call) = call_data else {
            return Err(GovernanceError::invalid_input("Starknet call-data must be a structured call"));
        };

        let mut args: Vec<[u8; 32]> = Vec::with_capacity(2);
        match call {
            StarknetCall::SetSigner { signer_address, active } => {
                args.push(felt(signer_address)?);
                args.push(felt_u64(u64::from(*active)));
            }
            StarknetCall::SetThreshold { threshold } => args.push(felt_u64(*threshold)),
        }

        let vid = target.vid.to_be_bytes();
        let to = felt(&target.contract_address)?;
        let expiration = felt_u64(expiration);
        let selector = selector(call.function_name());

        let mut parts: Vec<&[u8]> = vec![&vid, &to, &expiration, &selector];
        parts.extend(args.iter().map(|a| a.as_slice()));
        Ok(Digest(keccak256_concat(&parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors() {
        assert_eq!(
            hex::encode(selector("set_signer")),
            "0355c8f501a639a87777c4743c3708d11285cd9bc6266eacaf828a120c090348"
        );
        assert_eq!(
            hex::encode(selector("set_threshold")),
            "0220c69161563cf73ae6967a77e359842f80d4a7f927b80755886109805be505"
        );
    }

    #[test]
    fn test_felt_bounds() {
        assert_eq!(felt("0x01").unwrap()[31], 1);
        assert_eq!(felt("255").unwrap()[31], 0xff);
        assert!(felt("0x0800000000000011000000000000000000000000000000000000000000000001").is_err());
        assert!(felt("0x0800000000000011000000000000000000000000000000000000000000000000").is_ok());
        assert!(felt("not-a-number").is_err());
    }

    #[tokio::test]
    async fn test_set_signer_digest() {
        let target = ChainTarget::new("starknet", "0x0123", 500);
        let call_data = StarknetAdapter
            .build_call_data(&GovernanceOperation::add_signer("0xdef0000000000000000000000000000000000def"), &target)
            .await
            .unwrap();
        assert!(matches!(call_data, CallData::Structured(StarknetCall::SetSigner { active: true, .. })));

        let digest = StarknetAdapter.hash_call_data(&target, 1_700_000_000, &call_data).await.unwrap();
        assert_eq!(
            hex::encode(digest.as_bytes()),
            "83154cd4d25542a1a511b7056a2a3bece380bfce4970b66ee519beecf9c03be5"
        );
    }

    #[tokio::test]
    async fn test_decimal_felts_hash_like_hex() {
        let decimal = ChainTarget::new("starknet", "291", 500);
        let hexadecimal = ChainTarget::new("starknet", "0x0123", 500);
        let from_decimal = StarknetAdapter
            .build_call_data(&GovernanceOperation::add_signer("1000000000000000000000"), &decimal)
            .await
            .unwrap();
        let from_hex = StarknetAdapter
            .build_call_data(&GovernanceOperation::add_signer("0x3635c9adc5dea00000"), &hexadecimal)
            .await
            .unwrap();
        assert_eq!(
            StarknetAdapter.hash_call_data(&decimal, 1_700_000_000, &from_decimal).await.unwrap(),
            StarknetAdapter.hash_call_data(&hexadecimal, 1_700_000_000, &from_hex).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_set_threshold_digest() {
        let target = ChainTarget::new("starknet", "0x0123", 500);
        let call_data = StarknetAdapter
            .build_call_data(&GovernanceOperation::set_quorum(2), &target)
            .await
            .unwrap();
        let digest = StarknetAdapter.hash_call_data(&target, 1_700_000_000, &call_data).await.unwrap();
        assert_eq!(
            hex::encode(digest.as_bytes()),
            "d825bed885c820b2fffb93255cbdc5bec00a0f4aa6310aa92c86417481b706e6"
        );
    }

    #[tokio::test]
    async fn test_output_is_structured_call() {
        let call = CallData::Structured(StarknetCall::SetThreshold { threshold: 3 });
        let output = StarknetAdapter
            .output_call_data(&GovernanceOperation::set_quorum(3), &call)
            .unwrap();
        assert_eq!(output, serde_json::json!({"functionName": "set_threshold", "threshold": 3}));
    }
}
