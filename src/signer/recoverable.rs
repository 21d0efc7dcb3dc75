//! Recoverable signature builder
//!
//! Turns a DER signature from a custodial signer into the 65-byte
//! `r || s || v` layout verifiers expect:
//!
//! 1. Parse `r` and `s` from DER
//! 2. Canonicalize `s` into the lower half of the curve order
//! 3. Try recovery ids 0..=3 and keep the one that recovers the signer's key
//!
//! Local signers already know their recovery id, so they only go through
//! [`join_signature`].

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId, Signature as EcdsaSignature};
use secp256k1::{Message, PublicKey, Secp256k1};

use crate::error::{GovernanceError, GovernanceResult};
use crate::utils::crypto::evm_address;

/// Half the secp256k1 group order, big-endian
pub const HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// Length of a serialized recoverable signature
pub const RECOVERABLE_SIGNATURE_LEN: usize = 65;

/// Whether a big-endian `s` value is at most N/2
pub fn is_low_s(s: &[u8; 32]) -> bool {
    s <= &HALF_ORDER
}

/// Parse a DER signature and return its low-S compact form (`r || s`)
pub fn canonical_compact_from_der(der: &[u8]) -> GovernanceResult<[u8; 64]> {
    let mut signature = EcdsaSignature::from_der(der)
        .map_err(|e| GovernanceError::der_parse(format!("Invalid DER signature: {}", e)))?;
    signature.normalize_s();
    Ok(signature.serialize_compact())
}

/// Find the recovery id under which `compact` recovers `expected`
pub fn resolve_recovery_id(
    compact: &[u8; 64],
    message: &[u8; 32],
    expected: &PublicKey,
) -> GovernanceResult<u8> {
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest(*message);

    for candidate in 0..4i32 {
        let rec_id = RecoveryId::from_i32(candidate)?;
        let Ok(recoverable) = RecoverableSignature::from_compact(compact, rec_id) else {
            continue;
        };
        if let Ok(recovered) = secp.recover_ecdsa(&msg, &recoverable) {
            if &recovered == expected {
                return Ok(candidate as u8);
            }
        }
    }

    Err(GovernanceError::recovery_failed(format!(
        "No recovery id recovers the expected key {}",
        evm_address(expected)
    )))
}

/// Full custodial pipeline: DER in, `r || s || (recid + offset)` out
pub fn build_from_der(
    der: &[u8],
    message: &[u8; 32],
    expected: &PublicKey,
    recovery_offset: u8,
) -> GovernanceResult<Vec<u8>> {
    let compact = canonical_compact_from_der(der)?;
    let recovery_id = resolve_recovery_id(&compact, message, expected)?;
    Ok(join_signature(&compact, recovery_id, recovery_offset))
}

/// Concatenate `r || s` with the offset recovery byte
pub fn join_signature(compact: &[u8; 64], recovery_id: u8, recovery_offset: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(RECOVERABLE_SIGNATURE_LEN);
    out.extend_from_slice(compact);
    out.push(recovery_id + recovery_offset);
    out
}

/// Recover the EIP-55 address behind a 65-byte signature
pub fn recover_address(signature: &[u8], message: &[u8; 32], recovery_offset: u8) -> GovernanceResult<String> {
    if signature.len() != RECOVERABLE_SIGNATURE_LEN {
        return Err(GovernanceError::recovery_failed(format!(
            "Expected {} signature bytes, got {}",
            RECOVERABLE_SIGNATURE_LEN,
            signature.len()
        )));
    }

    let v = signature[64]
        .checked_sub(recovery_offset)
        .ok_or_else(|| GovernanceError::recovery_failed(format!("Invalid recovery byte {}", signature[64])))?;
    let rec_id = RecoveryId::from_i32(v as i32)?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], rec_id)?;

    let secp = Secp256k1::verification_only();
    let public_key = secp
        .recover_ecdsa(&Message::from_digest(*message), &recoverable)
        .map_err(|e| GovernanceError::recovery_failed(e.to_string()))?;
    Ok(evm_address(&public_key))
}

/// Check that a signature recovers to `expected_address` (case-insensitive)
pub fn verify_signer(
    signature: &[u8],
    message: &[u8; 32],
    recovery_offset: u8,
    expected_address: &str,
) -> GovernanceResult<()> {
    let recovered = recover_address(signature, message, recovery_offset)?;
    if !recovered.eq_ignore_ascii_case(expected_address) {
        return Err(GovernanceError::recovery_failed(format!(
            "Signature recovers to {} instead of {}",
            recovered, expected_address
        )));
    }
    Ok(())
}
