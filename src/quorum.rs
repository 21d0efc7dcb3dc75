//! Quorum Assembler
//!
//! Verifying contracts rebuild the payload's order themselves, so each
//! family's ordering rule must be reproduced exactly:
//!
//! - EVM / Move VM: ascending by address (case-insensitive), first
//!   `quorum`, signatures concatenated
//! - Solana: submission order, first `quorum`, list of hex strings
//! - Starknet: ascending by address as an integer, first `quorum`, list
//! - TON: every signature with its signer address, unsorted

use std::cmp::Ordering;

use crate::abi::U256;
use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{ChainFamily, QuorumPayload, Signature};

pub fn assemble(signatures: &[Signature], quorum: usize, family: ChainFamily) -> GovernanceResult<QuorumPayload> {
    if quorum > signatures.len() {
        return Err(GovernanceError::quorum_too_large(quorum, signatures.len()));
    }

    let payload = match family {
        ChainFamily::Evm | ChainFamily::MoveVm => {
            let mut sorted: Vec<&Signature> = signatures.iter().collect();
            sorted.sort_by(|a, b| compare_hex_addresses(&a.address, &b.address));
            QuorumPayload::Packed(
                sorted
                    .into_iter()
                    .take(quorum)
                    .flat_map(|s| s.signature.iter().copied())
                    .collect(),
            )
        }
        ChainFamily::Solana => {
            QuorumPayload::List(signatures.iter().take(quorum).map(Signature::signature_hex).collect())
        }
        ChainFamily::Starknet => {
            let mut keyed = signatures
                .iter()
                .map(|s| {
                    U256::parse(&s.address)
                        .map(|n| (n, s))
                        .map_err(|e| GovernanceError::invalid_input(format!("Invalid signer address '{}': {}", s.address, e)))
                })
                .collect::<GovernanceResult<Vec<_>>>()?;
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            QuorumPayload::List(keyed.into_iter().take(quorum).map(|(_, s)| s.signature_hex()).collect())
        }
        ChainFamily::Ton => QuorumPayload::Keyed(signatures.to_vec()),
    };
    Ok(payload)
}

fn compare_hex_addresses(a: &str, b: &str) -> Ordering {
    a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase())
}
