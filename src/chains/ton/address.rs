//! TON account addresses
//!
//! Accepts raw (`wc:hex`), bare `0x` hex (basechain) and the 48-character
//! user-friendly form. Always renders raw.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use std::fmt;
use std::str::FromStr;

use crate::error::{GovernanceError, GovernanceResult};
use crate::utils::crypto::parse_word;

pub const BASE_WORKCHAIN: i8 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TonAddress {
    pub workchain: i8,
    pub hash: [u8; 32],
}

impl TonAddress {
    pub fn new(workchain: i8, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    fn from_raw(s: &str) -> GovernanceResult<Self> {
        let (workchain, hash_hex) = s
            .split_once(':')
            .ok_or_else(|| GovernanceError::invalid_input("Invalid raw TON address format"))?;
        let workchain: i8 = workchain
            .parse()
            .map_err(|_| GovernanceError::invalid_input(format!("Invalid TON workchain '{}'", workchain)))?;
        if hash_hex.len() != 64 {
            return Err(GovernanceError::invalid_input("Invalid TON address hash length"));
        }

        let mut hash = [0u8; 32];
        hex::decode_to_slice(hash_hex, &mut hash)?;
        Ok(Self::new(workchain, hash))
    }

    fn from_user_friendly(s: &str) -> GovernanceResult<Self> {
        let bytes = if s.contains('-') || s.contains('_') {
            URL_SAFE_NO_PAD.decode(s)
        } else {
            STANDARD_NO_PAD.decode(s)
        }
        .map_err(|e| GovernanceError::invalid_input(format!("Base64 decode error: {}", e)))?;

        if bytes.len() != 36 {
            return Err(GovernanceError::invalid_input("Invalid decoded TON address length"));
        }

        let crc = u16::from_be_bytes([bytes[34], bytes[35]]);
        if crc != crc16_ccitt(&bytes[..34]) {
            return Err(GovernanceError::invalid_input("Invalid TON address checksum"));
        }

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);
        Ok(Self::new(bytes[1] as i8, hash))
    }
}

impl FromStr for TonAddress {
    type Err = GovernanceError;

    fn from_str(s: &str) -> GovernanceResult<Self> {
        let s = s.trim();
        if s.contains(':') {
            Self::from_raw(s)
        } else if s.starts_with("0x") || s.starts_with("0X") {
            Ok(Self::new(BASE_WORKCHAIN, parse_word(s)?))
        } else if s.len() == 48 {
            Self::from_user_friendly(s)
        } else {
            Err(GovernanceError::invalid_input(format!("Invalid TON address '{}'", s)))
        }
    }
}

impl fmt::Display for TonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

/// CRC16-CCITT (XMODEM)
fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw() {
        let raw = format!("-1:{}", "ab".repeat(32));
        let addr: TonAddress = raw.parse().unwrap();
        assert_eq!(addr.workchain, -1);
        assert_eq!(addr.hash, [0xab; 32]);
        assert_eq!(addr.to_string(), raw);
    }

    #[test]
    fn test_parse_hex_left_pads() {
        let addr: TonAddress = "0x0123".parse().unwrap();
        assert_eq!(addr.workchain, 0);
        assert_eq!(addr.hash[30..], [0x01, 0x23]);
        assert!(addr.hash[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_parse_user_friendly() {
        let url_safe: TonAddress = "EQCrq6urq6urq6urq6urq6urq6urq6urq6urq6urq6urq8Uk".parse().unwrap();
        assert_eq!(url_safe, TonAddress::new(0, [0xab; 32]));

        let standard: TonAddress = "Uf8AAQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eH78u".parse().unwrap();
        assert_eq!(standard.workchain, -1);
        assert_eq!(standard.hash[31], 31);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        assert!("EQCrq6urq6urq6urq6urq6urq6urq6urq6urq6urq6urq8Ul".parse::<TonAddress>().is_err());
        assert!("not-an-address".parse::<TonAddress>().is_err());
        assert!("0:abcd".parse::<TonAddress>().is_err());
    }
}
