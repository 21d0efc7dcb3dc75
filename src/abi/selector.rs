//! Function selector calculation

use crate::utils::crypto::keccak256;

/// ABI selector calculator
pub struct AbiSelector;

impl AbiSelector {
    /// Calculate function selector from signature string
    pub fn selector_from_signature(signature: &str) -> [u8; 4] {
        let hash = keccak256(signature.as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }
}

/// Selectors of the DVN admin functions
pub struct KnownSelectors;

impl KnownSelectors {
    pub const SET_SIGNER: [u8; 4] = [0x31, 0xcb, 0x61, 0x05]; // setSigner(address,bool)
    pub const SET_QUORUM: [u8; 4] = [0x85, 0x85, 0xc9, 0x45]; // setQuorum(uint64)
    pub const GRANT_ROLE: [u8; 4] = [0x2f, 0x2f, 0xf1, 0x5d]; // grantRole(bytes32,address)
    pub const REVOKE_ROLE: [u8; 4] = [0xd5, 0x47, 0x74, 0x1f]; // revokeRole(bytes32,address)
}
