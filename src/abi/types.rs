//! ABI type definitions for the DVN admin calls

use std::fmt;

use crate::error::{ErrorCode, GovernanceError};

/// Solidity types used by DVN admin functions and digest preimages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    Uint8,
    Uint32,
    Uint64,
    Uint256,
    Address,
    Bool,
    Bytes32,
    Bytes,
}

impl AbiType {
    /// Check if the type is dynamic (requires offset encoding)
    pub fn is_dynamic(&self) -> bool {
        matches!(self, AbiType::Bytes)
    }

    /// Byte width under `abi.encodePacked`, `None` for dynamic types
    pub fn packed_size(&self) -> Option<usize> {
        match self {
            AbiType::Uint8 | AbiType::Bool => Some(1),
            AbiType::Uint32 => Some(4),
            AbiType::Uint64 => Some(8),
            AbiType::Uint256 | AbiType::Bytes32 => Some(32),
            AbiType::Address => Some(20),
            AbiType::Bytes => None,
        }
    }

    /// Parse type from string representation
    pub fn parse(s: &str) -> Result<Self, AbiError> {
        match s.trim() {
            "uint8" => Ok(AbiType::Uint8),
            "uint32" => Ok(AbiType::Uint32),
            "uint64" => Ok(AbiType::Uint64),
            "uint256" | "uint" => Ok(AbiType::Uint256),
            "address" => Ok(AbiType::Address),
            "bool" => Ok(AbiType::Bool),
            "bytes32" => Ok(AbiType::Bytes32),
            "bytes" => Ok(AbiType::Bytes),
            other => Err(AbiError::InvalidType(format!("Unsupported type: {}", other))),
        }
    }

    /// Get the canonical type string for signature calculation
    pub fn canonical_type(&self) -> &'static str {
        match self {
            AbiType::Uint8 => "uint8",
            AbiType::Uint32 => "uint32",
            AbiType::Uint64 => "uint64",
            AbiType::Uint256 => "uint256",
            AbiType::Address => "address",
            AbiType::Bool => "bool",
            AbiType::Bytes32 => "bytes32",
            AbiType::Bytes => "bytes",
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_type())
    }
}

/// ABI value - runtime representation of Solidity values
#[derive(Debug, Clone, PartialEq)]
pub enum AbiValue {
    Uint(U256),
    Address([u8; 20]),
    Bool(bool),
    FixedBytes([u8; 32]),
    Bytes(Vec<u8>),
}

impl AbiValue {
    pub fn uint(value: u64) -> Self {
        AbiValue::Uint(U256::from(value))
    }

    /// Create an Address value from a hex string
    pub fn address_from_str(s: &str) -> Result<Self, AbiError> {
        let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if s.len() != 40 {
            return Err(AbiError::InvalidValue(format!("Address must be 20 bytes: 0x{}", s)));
        }
        let bytes = hex::decode(s)
            .map_err(|_| AbiError::InvalidValue("Invalid hex in address".to_string()))?;
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&bytes);
        Ok(AbiValue::Address(addr))
    }

    /// Get the type of this value
    pub fn get_type(&self) -> AbiType {
        match self {
            AbiValue::Uint(_) => AbiType::Uint256,
            AbiValue::Address(_) => AbiType::Address,
            AbiValue::Bool(_) => AbiType::Bool,
            AbiValue::FixedBytes(_) => AbiType::Bytes32,
            AbiValue::Bytes(_) => AbiType::Bytes,
        }
    }
}

/// 256-bit unsigned integer, little-endian limbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct U256(pub [u64; 4]);

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl U256 {
    pub const ZERO: U256 = U256([0, 0, 0, 0]);

    pub fn from(value: u64) -> Self {
        U256([value, 0, 0, 0])
    }

    /// Create from bytes (big-endian, at most 32)
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        let mut padded = [0u8; 32];
        let take = bytes.len().min(32);
        padded[32 - take..].copy_from_slice(&bytes[bytes.len() - take..]);

        let mut limbs = [0u64; 4];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let offset = (3 - i) * 8;
            let mut word = [0u8; 8];
            word.copy_from_slice(&padded[offset..offset + 8]);
            *limb = u64::from_be_bytes(word);
        }
        U256(limbs)
    }

    /// Convert to bytes (big-endian, 32 bytes)
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for i in 0..4 {
            let offset = (3 - i) * 8;
            bytes[offset..offset + 8].copy_from_slice(&self.0[i].to_be_bytes());
        }
        bytes
    }

    /// Parse a decimal or 0x-prefixed hex string
    pub fn parse(s: &str) -> Result<Self, AbiError> {
        let s = s.trim();
        if let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return Self::from_hex(digits);
        }
        Self::from_dec(s)
    }

    /// Parse from hex string (without 0x prefix, odd lengths allowed)
    pub fn from_hex(s: &str) -> Result<Self, AbiError> {
        let padded = if s.len() % 2 == 1 { format!("0{}", s) } else { s.to_string() };
        let bytes = hex::decode(&padded)
            .map_err(|_| AbiError::InvalidValue(format!("Invalid hex: {}", s)))?;
        if bytes.len() > 32 && bytes[..bytes.len() - 32].iter().any(|b| *b != 0) {
            return Err(AbiError::Overflow);
        }
        Ok(Self::from_be_bytes(&bytes))
    }

    /// Parse from decimal string
    pub fn from_dec(s: &str) -> Result<Self, AbiError> {
        if s.is_empty() {
            return Err(AbiError::InvalidValue("Empty number".to_string()));
        }
        let mut result = U256::ZERO;
        for c in s.chars() {
            let digit = c
                .to_digit(10)
                .ok_or_else(|| AbiError::InvalidValue(format!("Invalid decimal digit: {}", c)))?;
            result = result.checked_mul_u64(10).ok_or(AbiError::Overflow)?;
            result = result.checked_add(U256::from(digit as u64)).ok_or(AbiError::Overflow)?;
        }
        Ok(result)
    }

    /// Checked addition
    pub fn checked_add(&self, other: U256) -> Option<U256> {
        let mut result = [0u64; 4];
        let mut carry = 0u64;

        for i in 0..4 {
            let (sum1, c1) = self.0[i].overflowing_add(other.0[i]);
            let (sum2, c2) = sum1.overflowing_add(carry);
            result[i] = sum2;
            carry = (c1 as u64) + (c2 as u64);
        }

        if carry != 0 {
            None
        } else {
            Some(U256(result))
        }
    }

    /// Checked multiplication by u64
    pub fn checked_mul_u64(&self, other: u64) -> Option<U256> {
        let mut result = [0u64; 4];
        let mut carry = 0u128;

        for i in 0..4 {
            let prod = (self.0[i] as u128) * (other as u128) + carry;
            result[i] = prod as u64;
            carry = prod >> 64;
        }

        if carry != 0 {
            None
        } else {
            Some(U256(result))
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0, 0, 0, 0]
    }
}

/// ABI encoding failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    #[error("Invalid type: {0}")]
    InvalidType(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Encoding error: {0}")]
    EncodingError(String),
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },
    #[error("Integer overflow")]
    Overflow,
}

impl From<AbiError> for GovernanceError {
    fn from(e: AbiError) -> Self {
        GovernanceError::new(ErrorCode::InvalidInput, e.to_string())
    }
}
