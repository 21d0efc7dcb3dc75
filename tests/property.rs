use proptest::prelude::*;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId, Signature as EcdsaSignature};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use dvn_governance::quorum::assemble;
use dvn_governance::signer::recoverable::{build_from_der, is_low_s, recover_address, resolve_recovery_id};
use dvn_governance::utils::crypto::evm_address;
use dvn_governance::{ChainFamily, QuorumPayload, Signature};

const ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

fn any_secret_key() -> impl Strategy<Value = SecretKey> {
    prop::array::uniform32(any::<u8>()).prop_filter_map("valid secp256k1 scalar", |bytes| {
        SecretKey::from_slice(&bytes).ok()
    })
}

/// N - s, big-endian
fn negate(s: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut borrow = 0i16;
    for i in (0..32).rev() {
        let mut diff = ORDER[i] as i16 - s[i] as i16 - borrow;
        borrow = if diff < 0 { 1 } else { 0 };
        if diff < 0 {
            diff += 256;
        }
        out[i] = diff as u8;
    }
    out
}

/// DER signature over `message`, optionally with `s` flipped to the high half
fn der_signature(key: &SecretKey, message: &[u8; 32], high_s: bool) -> (Vec<u8>, PublicKey) {
    let secp = Secp256k1::new();
    let signature = secp.sign_ecdsa(&Message::from_digest(*message), key);
    let mut compact = signature.serialize_compact();
    if high_s {
        let flipped = negate(&compact[32..]);
        compact[32..].copy_from_slice(&flipped);
    }
    let der = EcdsaSignature::from_compact(&compact)
        .expect("compact signature parses")
        .serialize_der()
        .to_vec();
    (der, PublicKey::from_secret_key(&secp, key))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn der_signatures_come_out_low_s(
        key in any_secret_key(),
        message in prop::array::uniform32(any::<u8>()),
        high_s in any::<bool>(),
    ) {
        let (der, public_key) = der_signature(&key, &message, high_s);
        let signature = build_from_der(&der, &message, &public_key, 27).unwrap();

        prop_assert_eq!(signature.len(), 65);
        let mut s = [0u8; 32];
        s.copy_from_slice(&signature[32..64]);
        prop_assert!(is_low_s(&s));
        prop_assert!(signature[64] == 27 || signature[64] == 28);
    }

    #[test]
    fn exactly_one_recovery_id_matches(
        key in any_secret_key(),
        message in prop::array::uniform32(any::<u8>()),
    ) {
        let (der, public_key) = der_signature(&key, &message, false);
        let compact = EcdsaSignature::from_der(&der).unwrap().serialize_compact();

        let secp = Secp256k1::verification_only();
        let msg = Message::from_digest(message);
        let matching: Vec<i32> = (0..4)
            .filter(|id| {
                let Ok(rec_id) = RecoveryId::from_i32(*id) else { return false };
                RecoverableSignature::from_compact(&compact, rec_id)
                    .and_then(|sig| secp.recover_ecdsa(&msg, &sig))
                    .map(|recovered| recovered == public_key)
                    .unwrap_or(false)
            })
            .collect();
        prop_assert_eq!(matching.len(), 1);

        let resolved = resolve_recovery_id(&compact, &message, &public_key).unwrap();
        prop_assert_eq!(resolved as i32, matching[0]);

        let signature = build_from_der(&der, &message, &public_key, 0).unwrap();
        prop_assert_eq!(recover_address(&signature, &message, 0).unwrap(), evm_address(&public_key));
    }

    #[test]
    fn starknet_quorum_is_numerically_sorted(
        values in prop::collection::btree_set(any::<u64>(), 1..8),
        quorum_seed in any::<usize>(),
    ) {
        // submission order is the reverse of the numeric order
        let signatures: Vec<Signature> = values
            .iter()
            .rev()
            .map(|v| Signature::new(v.to_be_bytes().to_vec(), format!("{:#x}", v)))
            .collect();
        let quorum = quorum_seed % (signatures.len() + 1);

        let payload = assemble(&signatures, quorum, ChainFamily::Starknet).unwrap();
        let expected: Vec<String> = values
            .iter()
            .take(quorum)
            .map(|v| format!("0x{}", hex::encode(v.to_be_bytes())))
            .collect();
        prop_assert_eq!(payload, QuorumPayload::List(expected));
    }

    #[test]
    fn solana_quorum_keeps_submission_order(
        count in 1usize..8,
        quorum_seed in any::<usize>(),
    ) {
        let signatures: Vec<Signature> = (0..count)
            .map(|i| Signature::new(vec![i as u8; 64], format!("0x{:040x}", count - i)))
            .collect();
        let quorum = quorum_seed % (count + 1);

        let QuorumPayload::List(items) = assemble(&signatures, quorum, ChainFamily::Solana).unwrap() else {
            panic!("expected a list payload");
        };
        prop_assert_eq!(items.len(), quorum);
        for (i, item) in items.iter().enumerate() {
            prop_assert_eq!(item, &format!("0x{}", hex::encode(vec![i as u8; 64])));
        }
    }
}
