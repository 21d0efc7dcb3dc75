//! Secret store (AWS Secrets Manager)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{AwsCredentials, AwsJsonClient};
use crate::error::{GovernanceError, GovernanceResult};

/// Read-only, region-scoped secret lookup
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret_string(&self, secret_name: &str, region: &str) -> GovernanceResult<Zeroizing<String>>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueRequest<'a> {
    secret_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    secret_string: Option<String>,
}

/// Secrets Manager over the JSON 1.1 protocol
pub struct SecretsManagerClient {
    inner: AwsJsonClient,
}

impl SecretsManagerClient {
    pub fn new(credentials: AwsCredentials) -> GovernanceResult<Self> {
        Ok(Self {
            inner: AwsJsonClient::new(credentials, "secretsmanager", "secretsmanager")?,
        })
    }

    /// Send every request to `endpoint` instead of the regional host
    pub fn with_endpoint(mut self, endpoint: &str) -> GovernanceResult<Self> {
        self.inner.set_endpoint(endpoint)?;
        Ok(self)
    }
}

#[async_trait]
impl SecretStore for SecretsManagerClient {
    async fn get_secret_string(&self, secret_name: &str, region: &str) -> GovernanceResult<Zeroizing<String>> {
        let response: GetSecretValueResponse = self
            .inner
            .call(
                region,
                "GetSecretValue",
                &GetSecretValueRequest { secret_id: secret_name },
                |m| GovernanceError::secret_store(m),
            )
            .await?;

        response
            .secret_string
            .map(Zeroizing::new)
            .ok_or_else(|| GovernanceError::secret_store(format!("Secret {} has no string value", secret_name)))
    }
}
