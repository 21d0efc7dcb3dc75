//! Seed-phrase signers
//!
//! Both the secret-store backed signer and the raw local signer end up
//! here: BIP-39 seed, BIP-32 secp256k1 key for identity and ECDSA, and a
//! SLIP-0010 Ed25519 key for chains that opt into Edwards signatures.

use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::NetworkKind;
use bip39::Mnemonic;
use ed25519_dalek::Signer as _;
use hmac::{Hmac, Mac};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::Deserialize;
use sha2::Sha512;
use std::str::FromStr;
use zeroize::Zeroizing;

use super::recoverable::join_signature;
use super::SigningRequest;
use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{KeyScheme, Signature};
use crate::utils::crypto::evm_address;

type HmacSha512 = Hmac<Sha512>;

const HARDENED: u32 = 0x8000_0000;

/// Secret JSON keys holding the phrase and path
#[derive(Deserialize)]
struct MnemonicSecret {
    #[serde(rename = "LAYERZERO_WALLET_MNEMONIC")]
    mnemonic: String,
    #[serde(rename = "LAYERZERO_WALLET_PATH")]
    path: String,
}

/// Parse a secret-store payload into `(phrase, derivation path)`
pub fn parse_secret(secret: &str) -> GovernanceResult<(Zeroizing<String>, String)> {
    let parsed: MnemonicSecret = serde_json::from_str(secret)
        .map_err(|_| GovernanceError::secret_store("Secret is not a mnemonic secret payload"))?;
    Ok((Zeroizing::new(parsed.mnemonic), parsed.path))
}

/// BIP-39 seed with an empty passphrase
fn seed_from_phrase(phrase: &str) -> GovernanceResult<Zeroizing<[u8; 64]>> {
    let normalized = Zeroizing::new(phrase.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase());
    let mnemonic = Mnemonic::parse_normalized(&normalized)?;
    Ok(Zeroizing::new(mnemonic.to_seed_normalized("")))
}

/// BIP-32 secp256k1 key pair at `path`
pub fn derive_secp256k1(phrase: &str, path: &str) -> GovernanceResult<(SecretKey, PublicKey)> {
    let seed = seed_from_phrase(phrase)?;
    let path = DerivationPath::from_str(path)
        .map_err(|e| GovernanceError::invalid_input(format!("Invalid derivation path '{}': {}", path, e)))?;

    let secp = bitcoin::secp256k1::Secp256k1::new();
    let master = Xpriv::new_master(NetworkKind::Main, &seed[..])?;
    let child = master.derive_priv(&secp, &path)?;

    let secret_bytes = Zeroizing::new(child.private_key.secret_bytes());
    let secret_key = SecretKey::from_slice(&secret_bytes[..])?;
    let public_key = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret_key);
    Ok((secret_key, public_key))
}

/// SLIP-0010 Ed25519 key at `path`; every index is hardened
pub fn derive_ed25519(phrase: &str, path: &str) -> GovernanceResult<ed25519_dalek::SigningKey> {
    let seed = seed_from_phrase(phrase)?;

    let mut mac = HmacSha512::new_from_slice(b"ed25519 seed")
        .map_err(|e| GovernanceError::crypto_error(format!("HMAC error: {}", e)))?;
    mac.update(&seed[..]);
    let result = mac.finalize().into_bytes();

    let mut key = Zeroizing::new([0u8; 32]);
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&result[..32]);
    chain_code.copy_from_slice(&result[32..]);

    let components = path.trim().trim_start_matches('m').trim_start_matches('/');
    for component in components.split('/').filter(|c| !c.is_empty()) {
        let index: u32 = component
            .trim_end_matches(['\'', 'h'])
            .parse()
            .map_err(|_| GovernanceError::invalid_input(format!("Invalid path component: {}", component)))?;
        if index >= HARDENED {
            return Err(GovernanceError::invalid_input(format!("Path index out of range: {}", component)));
        }

        let mut mac = HmacSha512::new_from_slice(&chain_code)
            .map_err(|e| GovernanceError::crypto_error(format!("HMAC error: {}", e)))?;
        mac.update(&[0u8]);
        mac.update(&key[..]);
        mac.update(&(index | HARDENED).to_be_bytes());
        let result = mac.finalize().into_bytes();

        key.copy_from_slice(&result[..32]);
        chain_code.copy_from_slice(&result[32..]);
    }

    Ok(ed25519_dalek::SigningKey::from_bytes(&key))
}

/// Sign `request` with the key derived from `phrase` at `path`.
///
/// The signer is always identified by its secp256k1 address; on Ed25519
/// chains that key is only used for the address.
pub fn sign_with_phrase(phrase: &str, path: &str, request: &SigningRequest) -> GovernanceResult<Signature> {
    let (secret_key, public_key) = derive_secp256k1(phrase, path)?;
    let address = evm_address(&public_key);

    match request.key_scheme {
        KeyScheme::Secp256k1 => {
            let secp = Secp256k1::signing_only();
            let (recovery_id, compact) = secp
                .sign_ecdsa_recoverable(&Message::from_digest(request.message), &secret_key)
                .serialize_compact();
            let signature = join_signature(&compact, recovery_id.to_i32() as u8, request.recovery_offset);
            Ok(Signature::new(signature, address))
        }
        KeyScheme::Ed25519 => {
            let signing_key = derive_ed25519(phrase, path)?;
            let signature = signing_key.sign(&request.message);
            Ok(Signature::new(signature.to_bytes().to_vec(), address))
        }
    }
}
