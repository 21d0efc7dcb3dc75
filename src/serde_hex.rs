//! Serde helpers for byte fields
//!
//! Every byte string in the output artifact is rendered as 0x-prefixed hex,
//! the form on-chain submitters paste straight into a transaction.

use serde::{Deserialize, Deserializer, Serializer};

use crate::utils::crypto::{decode_hex_lenient, to_hex_prefixed};

/// Serialize/deserialize Vec<u8> as 0x-prefixed hex
pub mod prefixed {
    use super::*;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_hex_prefixed(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        decode_hex_lenient(&s).map_err(serde::de::Error::custom)
    }
}

/// Serialize/deserialize [u8; 32] as 0x-prefixed hex
pub mod prefixed32 {
    use super::*;

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_hex_prefixed(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_hex_lenient(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}
