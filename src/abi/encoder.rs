//! ABI encoder for Solidity/EVM contracts

use super::selector::AbiSelector;
use super::types::*;

/// ABI encoder
pub struct AbiEncoder;

impl AbiEncoder {
    /// Encode a single value into its head word (or length-prefixed tail for `bytes`)
    pub fn encode_value(value: &AbiValue, abi_type: &AbiType) -> Result<Vec<u8>, AbiError> {
        match (value, abi_type) {
            (AbiValue::Uint(u), AbiType::Uint8 | AbiType::Uint32 | AbiType::Uint64 | AbiType::Uint256) => {
                Self::check_width(u, abi_type)?;
                Ok(u.to_be_bytes().to_vec())
            }

            (AbiValue::Address(addr), AbiType::Address) => {
                let mut result = [0u8; 32];
                result[12..].copy_from_slice(addr);
                Ok(result.to_vec())
            }

            (AbiValue::Bool(b), AbiType::Bool) => {
                let mut result = [0u8; 32];
                result[31] = u8::from(*b);
                Ok(result.to_vec())
            }

            (AbiValue::FixedBytes(bytes), AbiType::Bytes32) => Ok(bytes.to_vec()),

            (AbiValue::Bytes(bytes), AbiType::Bytes) => Ok(Self::encode_dynamic_bytes(bytes)),

            _ => Err(AbiError::TypeMismatch {
                expected: abi_type.canonical_type().to_string(),
                got: value.get_type().canonical_type().to_string(),
            }),
        }
    }

    /// Encode multiple values (for function calls)
    pub fn encode(values: &[AbiValue], types: &[AbiType]) -> Result<Vec<u8>, AbiError> {
        if values.len() != types.len() {
            return Err(AbiError::EncodingError(format!(
                "Value count {} doesn't match type count {}",
                values.len(),
                types.len()
            )));
        }

        // Every supported head is a single word
        let head_size = types.len() * 32;
        let mut head = Vec::with_capacity(head_size);
        let mut tail = Vec::new();

        for (value, abi_type) in values.iter().zip(types.iter()) {
            let encoded = Self::encode_value(value, abi_type)?;
            if abi_type.is_dynamic() {
                let offset = U256::from((head_size + tail.len()) as u64);
                head.extend_from_slice(&offset.to_be_bytes());
                tail.extend_from_slice(&encoded);
            } else {
                head.extend_from_slice(&encoded);
            }
        }

        head.extend_from_slice(&tail);
        Ok(head)
    }

    /// Non-standard packed encoding (`abi.encodePacked`): minimal-width
    /// big-endian integers, raw 20-byte addresses, unpadded `bytes`.
    pub fn encode_packed(values: &[AbiValue], types: &[AbiType]) -> Result<Vec<u8>, AbiError> {
        if values.len() != types.len() {
            return Err(AbiError::EncodingError(format!(
                "Value count {} doesn't match type count {}",
                values.len(),
                types.len()
            )));
        }

        let mut out = Vec::new();
        for (value, abi_type) in values.iter().zip(types.iter()) {
            match (value, abi_type) {
                (AbiValue::Uint(u), AbiType::Uint8 | AbiType::Uint32 | AbiType::Uint64 | AbiType::Uint256) => {
                    Self::check_width(u, abi_type)?;
                    let width = abi_type.packed_size().unwrap_or(32);
                    out.extend_from_slice(&u.to_be_bytes()[32 - width..]);
                }
                (AbiValue::Address(addr), AbiType::Address) => out.extend_from_slice(addr),
                (AbiValue::Bool(b), AbiType::Bool) => out.push(u8::from(*b)),
                (AbiValue::FixedBytes(bytes), AbiType::Bytes32) => out.extend_from_slice(bytes),
                (AbiValue::Bytes(bytes), AbiType::Bytes) => out.extend_from_slice(bytes),
                _ => {
                    return Err(AbiError::TypeMismatch {
                        expected: abi_type.canonical_type().to_string(),
                        got: value.get_type().canonical_type().to_string(),
                    })
                }
            }
        }
        Ok(out)
    }

    /// Encode a function call by signature string
    /// e.g., "setSigner(address,bool)" with values
    pub fn encode_function_call_by_signature(
        signature: &str,
        values: &[AbiValue],
    ) -> Result<Vec<u8>, AbiError> {
        let selector = AbiSelector::selector_from_signature(signature);
        let types = Self::parse_types_from_signature(signature)?;

        if types.len() != values.len() {
            return Err(AbiError::EncodingError(format!(
                "Expected {} values for signature '{}', got {}",
                types.len(),
                signature,
                values.len()
            )));
        }

        let params = Self::encode(values, &types)?;

        let mut result = Vec::with_capacity(4 + params.len());
        result.extend_from_slice(&selector);
        result.extend_from_slice(&params);
        Ok(result)
    }

    /// Parse types from a function signature
    fn parse_types_from_signature(signature: &str) -> Result<Vec<AbiType>, AbiError> {
        let start = signature
            .find('(')
            .ok_or_else(|| AbiError::InvalidType("Missing '(' in signature".to_string()))?;
        let end = signature
            .rfind(')')
            .ok_or_else(|| AbiError::InvalidType("Missing ')' in signature".to_string()))?;

        let params_str = &signature[start + 1..end];
        if params_str.trim().is_empty() {
            return Ok(vec![]);
        }

        params_str.split(',').map(AbiType::parse).collect()
    }

    fn encode_dynamic_bytes(bytes: &[u8]) -> Vec<u8> {
        let padded_len = bytes.len().div_ceil(32) * 32;
        let mut result = Vec::with_capacity(32 + padded_len);
        result.extend_from_slice(&U256::from(bytes.len() as u64).to_be_bytes());
        result.extend_from_slice(bytes);
        result.resize(32 + padded_len, 0);
        result
    }

    fn check_width(value: &U256, abi_type: &AbiType) -> Result<(), AbiError> {
        let width = abi_type.packed_size().unwrap_or(32);
        let bytes = value.to_be_bytes();
        if bytes[..32 - width].iter().any(|b| *b != 0) {
            return Err(AbiError::InvalidValue(format!(
                "Value does not fit in {}",
                abi_type.canonical_type()
            )));
        }
        Ok(())
    }
}

/// Call-data builders for the DVN admin functions
pub struct DvnCall;

impl DvnCall {
    pub fn set_signer(signer: [u8; 20], active: bool) -> Result<Vec<u8>, AbiError> {
        AbiEncoder::encode_function_call_by_signature(
            "setSigner(address,bool)",
            &[AbiValue::Address(signer), AbiValue::Bool(active)],
        )
    }

    pub fn set_quorum(quorum: u64) -> Result<Vec<u8>, AbiError> {
        AbiEncoder::encode_function_call_by_signature("setQuorum(uint64)", &[AbiValue::uint(quorum)])
    }

    pub fn grant_role(role: [u8; 32], account: [u8; 20]) -> Result<Vec<u8>, AbiError> {
        AbiEncoder::encode_function_call_by_signature(
            "grantRole(bytes32,address)",
            &[AbiValue::FixedBytes(role), AbiValue::Address(account)],
        )
    }

    pub fn revoke_role(role: [u8; 32], account: [u8; 20]) -> Result<Vec<u8>, AbiError> {
        AbiEncoder::encode_function_call_by_signature(
            "revokeRole(bytes32,address)",
            &[AbiValue::FixedBytes(role), AbiValue::Address(account)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::KnownSelectors;
    use crate::utils::crypto::keccak256;

    #[test]
    fn test_set_signer_call_data() {
        let AbiValue::Address(signer) =
            AbiValue::address_from_str("0xdef0000000000000000000000000000000000def").unwrap()
        else {
            panic!("expected address");
        };
        let encoded = DvnCall::set_signer(signer, true).unwrap();
        assert_eq!(
            hex::encode(&encoded),
            "31cb6105000000000000000000000000def0000000000000000000000000000000000def\
             0000000000000000000000000000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_set_quorum_call_data() {
        let encoded = DvnCall::set_quorum(3).unwrap();
        assert_eq!(encoded.len(), 36);
        assert_eq!(&encoded[..4], &KnownSelectors::SET_QUORUM);
        assert_eq!(encoded[35], 3);
    }

    #[test]
    fn test_role_call_data() {
        let role = keccak256(b"MESSAGE_LIB_ROLE");
        let grant = DvnCall::grant_role(role, [0x22; 20]).unwrap();
        let revoke = DvnCall::revoke_role(role, [0x22; 20]).unwrap();
        assert_eq!(&grant[..4], &KnownSelectors::GRANT_ROLE);
        assert_eq!(&revoke[..4], &KnownSelectors::REVOKE_ROLE);
        assert_eq!(&grant[4..36], &role);
        assert_eq!(&grant[4..], &revoke[4..]);
    }

    #[test]
    fn test_encode_dynamic_bytes_offset() {
        let encoded = AbiEncoder::encode(
            &[AbiValue::uint(1), AbiValue::Bytes(vec![0xab; 33])],
            &[AbiType::Uint256, AbiType::Bytes],
        )
        .unwrap();
        // head (2 words) + length word + 2 padded data words
        assert_eq!(encoded.len(), 32 * 5);
        assert_eq!(encoded[63], 64);
        assert_eq!(encoded[95], 33);
    }

    #[test]
    fn test_encode_packed_digest_preimage() {
        let packed = AbiEncoder::encode_packed(
            &[
                AbiValue::uint(30101),
                AbiValue::Address([0x11; 20]),
                AbiValue::uint(1_700_000_000),
                AbiValue::Bytes(vec![0x12, 0x34]),
            ],
            &[AbiType::Uint32, AbiType::Address, AbiType::Uint256, AbiType::Bytes],
        )
        .unwrap();
        assert_eq!(packed.len(), 4 + 20 + 32 + 2);
        assert_eq!(
            hex::encode(keccak256(&packed)),
            "097fb0709066ac2dc47215a7cc97cbcce13bae729d5c6be289df0165a94b73ca"
        );
    }

    #[test]
    fn test_width_overflow_rejected() {
        let err = AbiEncoder::encode_packed(&[AbiValue::uint(1 << 40)], &[AbiType::Uint32]).unwrap_err();
        assert!(matches!(err, AbiError::InvalidValue(_)));
    }

    #[test]
    fn test_type_mismatch() {
        let err = AbiEncoder::encode(&[AbiValue::Bool(true)], &[AbiType::Address]).unwrap_err();
        assert!(matches!(err, AbiError::TypeMismatch { .. }));
    }
}
