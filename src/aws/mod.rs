//! AWS collaborators: custodial signing (KMS) and the secret store
//! (Secrets Manager)
//!
//! Both speak the AWS JSON 1.1 protocol, so requests share one signer
//! (Signature Version 4) and one error decoder.

pub mod credentials;
pub mod kms;
pub mod secrets;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use url::Url;
use zeroize::Zeroizing;

use crate::error::{GovernanceError, GovernanceResult};
use crate::utils::http::default_client;

pub use kms::{CustodialSigningService, KmsClient};
pub use secrets::{SecretStore, SecretsManagerClient};

type HmacSha256 = Hmac<Sha256>;

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Credentials for request signing; see [`credentials`] for resolution
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: Zeroizing<String>,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: Zeroizing::new(secret_access_key.into()),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Derive the SigV4 signing key for one day/region/service
pub fn signing_key(secret_access_key: &str, date: &str, region: &str, service: &str) -> GovernanceResult<[u8; 32]> {
    let secret = Zeroizing::new(format!("AWS4{}", secret_access_key));
    let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> GovernanceResult<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| GovernanceError::crypto_error(format!("HMAC error: {}", e)))?;
    mac.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Headers for a signed AWS JSON 1.1 POST to `/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub amz_date: String,
    pub authorization: String,
    pub security_token: Option<String>,
}

/// Sign a POST of `body` to `host` with target header `amz_target`
pub fn sign_json_request(
    credentials: &AwsCredentials,
    service: &str,
    region: &str,
    host: &str,
    amz_target: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> GovernanceResult<SignedHeaders> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let mut canonical_headers = format!("content-type:{}\nhost:{}\nx-amz-date:{}\n", AMZ_JSON, host, amz_date);
    let mut signed_headers = String::from("content-type;host;x-amz-date");
    if let Some(token) = &credentials.session_token {
        canonical_headers.push_str(&format!("x-amz-security-token:{}\n", token));
        signed_headers.push_str(";x-amz-security-token");
    }
    canonical_headers.push_str(&format!("x-amz-target:{}\n", amz_target));
    signed_headers.push_str(";x-amz-target");

    let canonical_request = format!(
        "POST\n/\n\n{}\n{}\n{}",
        canonical_headers,
        signed_headers,
        sha256_hex(body)
    );

    let scope = format!("{}/{}/{}/aws4_request", date, region, service);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(&credentials.secret_access_key, &date, region, service)?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

    Ok(SignedHeaders {
        authorization: format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
        ),
        amz_date,
        security_token: credentials.session_token.clone(),
    })
}

#[derive(Debug, Deserialize)]
struct AwsErrorBody {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// One AWS JSON 1.1 service endpoint family
pub(crate) struct AwsJsonClient {
    http: Client,
    credentials: AwsCredentials,
    service: &'static str,
    target_prefix: &'static str,
    endpoint_override: Option<Url>,
}

impl AwsJsonClient {
    pub(crate) fn new(
        credentials: AwsCredentials,
        service: &'static str,
        target_prefix: &'static str,
    ) -> GovernanceResult<Self> {
        Ok(Self {
            http: default_client()?,
            credentials,
            service,
            target_prefix,
            endpoint_override: None,
        })
    }

    pub(crate) fn set_endpoint(&mut self, endpoint: &str) -> GovernanceResult<()> {
        let url = Url::parse(endpoint)
            .map_err(|e| GovernanceError::invalid_input(format!("Invalid {} endpoint: {}", self.service, e)))?;
        self.endpoint_override = Some(url);
        Ok(())
    }

    fn endpoint(&self, region: &str) -> GovernanceResult<Url> {
        match &self.endpoint_override {
            Some(url) => Ok(url.clone()),
            None => Url::parse(&format!("https://{}.{}.amazonaws.com/", self.service, region))
                .map_err(|e| GovernanceError::invalid_input(format!("Invalid region '{}': {}", region, e))),
        }
    }

    /// POST `action` and decode the JSON reply. Failures are built with
    /// `on_error` so each service reports under its own error code.
    pub(crate) async fn call<B, R>(
        &self,
        region: &str,
        action: &str,
        body: &B,
        on_error: fn(String) -> GovernanceError,
    ) -> GovernanceResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(region)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(GovernanceError::invalid_input(format!("Endpoint {} has no host", url))),
        };

        let payload = serde_json::to_vec(body)?;
        let target = format!("{}.{}", self.target_prefix, action);
        let signed = sign_json_request(&self.credentials, self.service, region, &host, &target, &payload, Utc::now())?;

        let mut request = self
            .http
            .post(url)
            .header("content-type", AMZ_JSON)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-target", &target)
            .header("authorization", &signed.authorization);
        if let Some(token) = &signed.security_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|e| on_error(format!("{} request failed: {}", target, e)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| on_error(format!("{} response unreadable: {}", target, e)))?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<AwsErrorBody>(&bytes)
                .ok()
                .map(|e| {
                    format!(
                        "{}: {}",
                        e.kind.unwrap_or_else(|| "UnknownError".to_string()),
                        e.message.unwrap_or_default()
                    )
                })
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());
            return Err(on_error(format!("{} returned HTTP {}", target, status)).with_details(detail));
        }

        serde_json::from_slice(&bytes).map_err(|e| on_error(format!("{} response malformed: {}", target, e)))
    }
}
