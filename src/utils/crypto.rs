//! Hashing and Address Utilities
//!
//! Keccak-256, EIP-55 checksums and the hex conventions shared by every
//! chain adapter.

use secp256k1::PublicKey;
use tiny_keccak::{Hasher, Keccak};

use crate::error::{GovernanceError, GovernanceResult};

/// Ethereum message prefix for personal_sign
const ETH_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Keccak256 over several slices without concatenating them first
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// EIP-191 personal message hash of a 32-byte digest
pub fn personal_sign_hash(message: &[u8]) -> [u8; 32] {
    let prefix = format!("{}{}", ETH_MESSAGE_PREFIX, message.len());
    keccak256_concat(&[prefix.as_bytes(), message])
}

/// Convert raw address bytes to checksummed Ethereum address
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut result = String::from("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_digit() {
            result.push(ch);
        } else if nibble >= 8 {
            result.push(ch.to_ascii_uppercase());
        } else {
            result.push(ch);
        }
    }

    result
}

/// 20-byte EVM address of a secp256k1 public key
pub fn evm_address_bytes(public_key: &PublicKey) -> [u8; 20] {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Checksummed EVM address of a secp256k1 public key
pub fn evm_address(public_key: &PublicKey) -> String {
    to_checksum_address(&evm_address_bytes(public_key))
}

/// Strip an optional 0x/0X prefix
pub fn trim_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Hex-encode with a 0x prefix
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex, tolerating a 0x prefix and an odd number of digits
/// (left-padded with a zero nibble).
pub fn decode_hex_lenient(s: &str) -> GovernanceResult<Vec<u8>> {
    let digits = trim_0x(s.trim());
    if digits.len() % 2 == 1 {
        Ok(hex::decode(format!("0{}", digits))?)
    } else {
        Ok(hex::decode(digits)?)
    }
}

/// Parse a 20-byte EVM address (checksum not enforced)
pub fn parse_evm_address(s: &str) -> GovernanceResult<[u8; 20]> {
    let bytes = hex::decode(trim_0x(s.trim()))
        .map_err(|e| GovernanceError::invalid_input(format!("Invalid address '{}': {}", s, e)))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        GovernanceError::invalid_input(format!("Invalid address '{}': expected 20 bytes, got {}", s, v.len()))
    })
}

/// Parse a hex quantity into a 32-byte big-endian word
pub fn parse_word(s: &str) -> GovernanceResult<[u8; 32]> {
    let bytes = decode_hex_lenient(s)?;
    if bytes.len() > 32 {
        return Err(GovernanceError::invalid_input(format!(
            "Value '{}' does not fit in 32 bytes",
            s
        )));
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}
