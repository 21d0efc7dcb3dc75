//! Custodial signing service (AWS KMS, `ECC_SECG_P256K1` keys)

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

use super::{AwsCredentials, AwsJsonClient};
use crate::error::{GovernanceError, GovernanceResult};

/// Remote signer holding private keys by opaque id
#[async_trait]
pub trait CustodialSigningService: Send + Sync {
    /// DER-encoded SubjectPublicKeyInfo of the key
    async fn get_public_key(&self, key_id: &str, region: &str) -> GovernanceResult<Vec<u8>>;

    /// DER-encoded ECDSA signature over a 32-byte digest
    async fn sign_digest(&self, key_id: &str, region: &str, digest: &[u8; 32]) -> GovernanceResult<Vec<u8>>;
}

/// Extract the uncompressed secp256k1 point from a SubjectPublicKeyInfo.
/// The point is the trailing 65 bytes of the BIT STRING.
pub fn public_key_from_spki(spki: &[u8]) -> GovernanceResult<PublicKey> {
    if spki.len() < 65 {
        return Err(GovernanceError::der_parse(format!(
            "Public key info too short: {} bytes",
            spki.len()
        )));
    }
    let point = &spki[spki.len() - 65..];
    if point[0] != 0x04 {
        return Err(GovernanceError::der_parse("Public key is not an uncompressed point"));
    }
    PublicKey::from_slice(point).map_err(|e| GovernanceError::der_parse(format!("Invalid public key: {}", e)))
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetPublicKeyRequest<'a> {
    key_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetPublicKeyResponse {
    public_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SignRequest<'a> {
    key_id: &'a str,
    message: String,
    message_type: &'static str,
    signing_algorithm: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignResponse {
    signature: String,
}

/// KMS over the JSON 1.1 protocol
pub struct KmsClient {
    inner: AwsJsonClient,
}

impl KmsClient {
    pub fn new(credentials: AwsCredentials) -> GovernanceResult<Self> {
        Ok(Self {
            inner: AwsJsonClient::new(credentials, "kms", "TrentService")?,
        })
    }

    /// Send every request to `endpoint` instead of the regional host
    pub fn with_endpoint(mut self, endpoint: &str) -> GovernanceResult<Self> {
        self.inner.set_endpoint(endpoint)?;
        Ok(self)
    }
}

#[async_trait]
impl CustodialSigningService for KmsClient {
    async fn get_public_key(&self, key_id: &str, region: &str) -> GovernanceResult<Vec<u8>> {
        let response: GetPublicKeyResponse = self
            .inner
            .call(region, "GetPublicKey", &GetPublicKeyRequest { key_id }, |m| {
                GovernanceError::custodial_signer(m)
            })
            .await?;
        Ok(BASE64.decode(response.public_key)?)
    }

    async fn sign_digest(&self, key_id: &str, region: &str, digest: &[u8; 32]) -> GovernanceResult<Vec<u8>> {
        let request = SignRequest {
            key_id,
            message: BASE64.encode(digest),
            message_type: "DIGEST",
            signing_algorithm: "ECDSA_SHA_256",
        };
        let response: SignResponse = self
            .inner
            .call(region, "Sign", &request, |m| GovernanceError::custodial_signer(m))
            .await?;
        Ok(BASE64.decode(response.signature)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::{Secp256k1, SecretKey};

    // DER prefix of an id-ecPublicKey / secp256k1 SubjectPublicKeyInfo
    const SPKI_PREFIX: &str = "3056301006072a8648ce3d020106052b8104000a034200";

    #[test]
    fn test_public_key_from_spki() {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[1u8; 32]).unwrap();
        let pk = PublicKey::from_secret_key(&secp, &sk);

        let mut spki = hex::decode(SPKI_PREFIX).unwrap();
        spki.extend_from_slice(&pk.serialize_uncompressed());
        assert_eq!(public_key_from_spki(&spki).unwrap(), pk);
    }

    #[test]
    fn test_public_key_from_spki_rejects_compressed() {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[1u8; 32]).unwrap();
        let pk = PublicKey::from_secret_key(&secp, &sk);

        let mut spki = hex::decode(SPKI_PREFIX).unwrap();
        spki.extend_from_slice(&pk.serialize());
        let err = public_key_from_spki(&spki).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::DerParse);
        assert!(public_key_from_spki(&[0x04; 10]).is_err());
    }
}
