//! Custodial signer: the key never leaves the signing service

use super::recoverable::build_from_der;
use super::SigningRequest;
use crate::aws::kms::{public_key_from_spki, CustodialSigningService};
use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{KeyScheme, Signature};
use crate::utils::crypto::evm_address;

/// Fetch the public key, have the service sign, then normalize the DER
/// reply into a recoverable signature.
pub async fn sign_custodial(
    service: &dyn CustodialSigningService,
    key_id: &str,
    region: &str,
    request: &SigningRequest,
) -> GovernanceResult<Signature> {
    if request.key_scheme != KeyScheme::Secp256k1 {
        return Err(GovernanceError::unsupported(
            "Custodial keys are secp256k1 only; Ed25519 chains need a mnemonic signer",
        ));
    }

    let spki = service.get_public_key(key_id, region).await?;
    let public_key = public_key_from_spki(&spki)?;
    let der = service.sign_digest(key_id, region, &request.message).await?;

    let signature = build_from_der(&der, &request.message, &public_key, request.recovery_offset)?;
    Ok(Signature::new(signature, evm_address(&public_key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

    struct LocalKms {
        secret: SecretKey,
    }

    #[async_trait]
    impl CustodialSigningService for LocalKms {
        async fn get_public_key(&self, _key_id: &str, _region: &str) -> GovernanceResult<Vec<u8>> {
            let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &self.secret);
            let mut spki = hex::decode("3056301006072a8648ce3d020106052b8104000a034200").unwrap();
            spki.extend_from_slice(&public_key.serialize_uncompressed());
            Ok(spki)
        }

        async fn sign_digest(&self, _key_id: &str, _region: &str, digest: &[u8; 32]) -> GovernanceResult<Vec<u8>> {
            let sig = Secp256k1::new().sign_ecdsa(&Message::from_digest(*digest), &self.secret);
            Ok(sig.serialize_der().to_vec())
        }
    }

    #[tokio::test]
    async fn test_custodial_signature_layout() {
        let kms = LocalKms { secret: SecretKey::from_slice(&[1u8; 32]).unwrap() };
        let request = SigningRequest {
            message: [0x33; 32],
            recovery_offset: 27,
            key_scheme: KeyScheme::Secp256k1,
        };
        let signature = sign_custodial(&kms, "key", "us-east-1", &request).await.unwrap();
        assert_eq!(signature.signature.len(), 65);
        assert!(signature.signature[64] == 27 || signature.signature[64] == 28);
        crate::signer::recoverable::verify_signer(&signature.signature, &request.message, 27, &signature.address)
            .unwrap();
    }

    #[tokio::test]
    async fn test_custodial_rejects_ed25519() {
        let kms = LocalKms { secret: SecretKey::from_slice(&[1u8; 32]).unwrap() };
        let request = SigningRequest {
            message: [0x33; 32],
            recovery_offset: 0,
            key_scheme: KeyScheme::Ed25519,
        };
        let err = sign_custodial(&kms, "key", "us-east-1", &request).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::UnsupportedOperation);
    }
}
