//! Signer backends
//!
//! Hides where a key lives. Every backend signs the exact 32-byte message
//! the chain adapter hands it and returns the signature together with the
//! signer's EIP-55 address.

pub mod custodial;
pub mod mnemonic;
pub mod recoverable;

use async_trait::async_trait;
use std::sync::Arc;

use crate::aws::{CustodialSigningService, SecretStore};
use crate::error::{GovernanceError, GovernanceResult};
use crate::log_debug;
use crate::types::{KeyScheme, Signature, SignerDescriptor};

/// What a chain adapter asks a signer to sign
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningRequest {
    /// Final 32-byte preimage (already prefixed where the chain requires it)
    pub message: [u8; 32],
    /// Added to the ECDSA recovery id (27 on EVM)
    pub recovery_offset: u8,
    pub key_scheme: KeyScheme,
}

#[async_trait]
pub trait SignerBackend: Send + Sync {
    async fn sign(&self, descriptor: &SignerDescriptor, request: &SigningRequest) -> GovernanceResult<Signature>;
}

/// Dispatches each descriptor to its custody model
#[derive(Clone, Default)]
pub struct Signers {
    custodial: Option<Arc<dyn CustodialSigningService>>,
    secrets: Option<Arc<dyn SecretStore>>,
}

impl Signers {
    /// Backends for local signing only
    pub fn local() -> Self {
        Self::default()
    }

    pub fn with_custodial(mut self, service: Arc<dyn CustodialSigningService>) -> Self {
        self.custodial = Some(service);
        self
    }

    pub fn with_secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(store);
        self
    }

    async fn sign_unverified(&self, descriptor: &SignerDescriptor, request: &SigningRequest) -> GovernanceResult<Signature> {
        match descriptor {
            SignerDescriptor::Custodial { key_id, region } => {
                let service = self
                    .custodial
                    .as_deref()
                    .ok_or_else(|| GovernanceError::invalid_input("No custodial signing service configured"))?;
                custodial::sign_custodial(service, key_id, region, request).await
            }
            SignerDescriptor::DerivedMnemonic { secret_name, region } => {
                let store = self
                    .secrets
                    .as_deref()
                    .ok_or_else(|| GovernanceError::invalid_input("No secret store configured"))?;
                let secret = store.get_secret_string(secret_name, region).await?;
                let (phrase, path) = mnemonic::parse_secret(&secret)?;
                mnemonic::sign_with_phrase(&phrase, &path, request)
            }
            SignerDescriptor::RawMnemonic { phrase, derivation_path } => {
                mnemonic::sign_with_phrase(phrase, derivation_path, request)
            }
        }
    }
}

#[async_trait]
impl SignerBackend for Signers {
    /// Sign, then re-recover ECDSA signatures to check they name the
    /// reported signer.
    async fn sign(&self, descriptor: &SignerDescriptor, request: &SigningRequest) -> GovernanceResult<Signature> {
        let signature = self.sign_unverified(descriptor, request).await?;

        if request.key_scheme == KeyScheme::Secp256k1 {
            recoverable::verify_signer(
                &signature.signature,
                &request.message,
                request.recovery_offset,
                &signature.address,
            )?;
        }

        log_debug!("signer", "Signature produced", signer = signature.address, mode = format!("{:?}", descriptor.mode()));
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroize::Zeroizing;

    const HARDHAT: &str = "test test test test test test test test test test test junk";

    struct StaticSecrets(String);

    #[async_trait]
    impl SecretStore for StaticSecrets {
        async fn get_secret_string(&self, _name: &str, _region: &str) -> GovernanceResult<Zeroizing<String>> {
            Ok(Zeroizing::new(self.0.clone()))
        }
    }

    fn request() -> SigningRequest {
        SigningRequest { message: [0x44; 32], recovery_offset: 27, key_scheme: KeyScheme::Secp256k1 }
    }

    #[tokio::test]
    async fn test_raw_and_derived_mnemonic_agree() {
        let secret = serde_json::json!({
            "LAYERZERO_WALLET_MNEMONIC": HARDHAT,
            "LAYERZERO_WALLET_PATH": "m/44'/60'/0'/0/2",
        })
        .to_string();
        let signers = Signers::local().with_secret_store(Arc::new(StaticSecrets(secret)));

        let derived = signers
            .sign(&SignerDescriptor::derived_mnemonic("dvn/signer", "us-east-1"), &request())
            .await
            .unwrap();
        let raw = signers
            .sign(&SignerDescriptor::raw_mnemonic(HARDHAT, "m/44'/60'/0'/0/2"), &request())
            .await
            .unwrap();

        assert_eq!(derived, raw);
        assert_eq!(raw.address, "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");
    }

    #[tokio::test]
    async fn test_missing_backends_are_configuration_errors() {
        let signers = Signers::local();
        let err = signers
            .sign(&SignerDescriptor::custodial("k", "us-east-1"), &request())
            .await
            .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Configuration);

        let err = signers
            .sign(&SignerDescriptor::derived_mnemonic("s", "us-east-1"), &request())
            .await
            .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Configuration);
    }
}
