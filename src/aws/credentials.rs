//! Credential resolution for the AWS clients
//!
//! Sources are tried in order, first hit wins:
//! 1. `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` (+ `AWS_SESSION_TOKEN`)
//! 2. the shared credentials file, profile `AWS_PROFILE` or `default`
//! 3. the container credentials endpoint (ECS task roles, EKS pod identity)

use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use url::Url;

use super::AwsCredentials;
use crate::error::{GovernanceError, GovernanceResult};
use crate::log_debug;
use crate::utils::http::default_client;

const CONTAINER_HOST: &str = "http://169.254.170.2";
const CONTAINER_HOSTS: [&str; 2] = ["169.254.170.2", "169.254.170.23"];

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerCredentials {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    token: Option<String>,
}

impl AwsCredentials {
    /// Resolve credentials from the process environment
    pub async fn resolve() -> GovernanceResult<Self> {
        Self::resolve_with(|name| std::env::var(name).ok()).await
    }

    /// Resolve credentials reading variables through `lookup`
    pub async fn resolve_with<F>(lookup: F) -> GovernanceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(access_key_id) = var("AWS_ACCESS_KEY_ID") {
            let secret = var("AWS_SECRET_ACCESS_KEY").ok_or_else(|| {
                GovernanceError::invalid_input("AWS_ACCESS_KEY_ID is set but AWS_SECRET_ACCESS_KEY is not")
            })?;
            let mut credentials = Self::new(access_key_id, secret);
            if let Some(token) = var("AWS_SESSION_TOKEN") {
                credentials = credentials.with_session_token(token);
            }
            log_debug!("aws", "Credentials resolved", source = "environment");
            return Ok(credentials);
        }

        let explicit_profile = var("AWS_PROFILE");
        let profile = explicit_profile.clone().unwrap_or_else(|| "default".to_string());
        if let Some(path) = shared_credentials_path(&var) {
            if path.is_file() {
                if let Some(credentials) = load_profile(&path, &profile)? {
                    log_debug!("aws", "Credentials resolved", source = "profile", profile = profile);
                    return Ok(credentials);
                }
            }
        }
        if explicit_profile.is_some() {
            return Err(GovernanceError::invalid_input(format!(
                "AWS profile '{}' not found in the shared credentials file",
                profile
            )));
        }

        if let Some(url) = container_url(&var)? {
            let token = match (var("AWS_CONTAINER_AUTHORIZATION_TOKEN"), var("AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE")) {
                (Some(token), _) => Some(token),
                (None, Some(file)) => Some(std::fs::read_to_string(file)?.trim().to_string()),
                (None, None) => None,
            };
            let credentials = Self::from_container_endpoint(&url, token.as_deref()).await?;
            log_debug!("aws", "Credentials resolved", source = "container");
            return Ok(credentials);
        }

        Err(GovernanceError::invalid_input(
            "No AWS credentials found: set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY, \
             configure a shared credentials profile, or run with a container credentials endpoint",
        ))
    }

    /// Read one profile from a shared credentials file
    pub fn from_profile_file(path: &Path, profile: &str) -> GovernanceResult<Self> {
        load_profile(path, profile)?.ok_or_else(|| {
            GovernanceError::invalid_input(format!("AWS profile '{}' not found in {}", profile, path.display()))
        })
    }

    /// Fetch temporary credentials from a container credentials endpoint
    pub async fn from_container_endpoint(url: &Url, authorization: Option<&str>) -> GovernanceResult<Self> {
        let mut request = default_client()?.get(url.clone());
        if let Some(token) = authorization {
            request = request.header("authorization", token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| GovernanceError::rpc(format!("Container credentials request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(
                GovernanceError::rpc(format!("Container credentials endpoint returned HTTP {}", status)).with_details(body)
            );
        }

        let body: ContainerCredentials = response
            .json()
            .await
            .map_err(|e| GovernanceError::rpc(format!("Container credentials malformed: {}", e)))?;
        let mut credentials = Self::new(body.access_key_id, body.secret_access_key);
        if let Some(token) = body.token.filter(|t| !t.is_empty()) {
            credentials = credentials.with_session_token(token);
        }
        Ok(credentials)
    }
}

fn shared_credentials_path(var: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(path) = var("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }
    var("HOME")
        .or_else(|| var("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".aws").join("credentials"))
}

fn load_profile(path: &Path, profile: &str) -> GovernanceResult<Option<AwsCredentials>> {
    let contents = std::fs::read_to_string(path)?;
    parse_profile(&contents, profile)
}

/// INI-style lookup; `[name]` and `[profile name]` headers both match
fn parse_profile(contents: &str, profile: &str) -> GovernanceResult<Option<AwsCredentials>> {
    let mut in_profile = false;
    let mut found = false;
    let mut access_key_id = None;
    let mut secret_access_key = None;
    let mut session_token = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let header = header.trim();
            let name = header.strip_prefix("profile ").map(str::trim).unwrap_or(header);
            in_profile = name == profile;
            found |= in_profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "aws_access_key_id" => access_key_id = Some(value),
                "aws_secret_access_key" => secret_access_key = Some(value),
                "aws_session_token" => session_token = Some(value),
                _ => {}
            }
        }
    }

    if !found {
        return Ok(None);
    }
    let (access_key_id, secret_access_key) = match (access_key_id, secret_access_key) {
        (Some(id), Some(secret)) => (id, secret),
        _ => {
            return Err(GovernanceError::invalid_input(format!(
                "AWS profile '{}' lacks aws_access_key_id or aws_secret_access_key",
                profile
            )))
        }
    };
    let mut credentials = AwsCredentials::new(access_key_id, secret_access_key);
    if let Some(token) = session_token.filter(|t| !t.is_empty()) {
        credentials = credentials.with_session_token(token);
    }
    Ok(Some(credentials))
}

/// Relative URIs hang off the ECS agent; full URIs must be HTTPS, loopback
/// or one of the container agent addresses.
fn container_url(var: &impl Fn(&str) -> Option<String>) -> GovernanceResult<Option<Url>> {
    if let Some(relative) = var("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI") {
        let url = Url::parse(&format!("{}{}", CONTAINER_HOST, relative))
            .map_err(|e| GovernanceError::invalid_input(format!("Invalid container credentials URI: {}", e)))?;
        return Ok(Some(url));
    }
    let Some(full) = var("AWS_CONTAINER_CREDENTIALS_FULL_URI") else {
        return Ok(None);
    };
    let url = Url::parse(&full)
        .map_err(|e| GovernanceError::invalid_input(format!("Invalid container credentials URI: {}", e)))?;
    let host = url.host_str().unwrap_or_default();
    let allowed = url.scheme() == "https"
        || host == "localhost"
        || CONTAINER_HOSTS.contains(&host)
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false);
    if !allowed {
        return Err(GovernanceError::invalid_input(format!(
            "Container credentials URI {} must use HTTPS or a loopback host",
            url
        )));
    }
    Ok(Some(url))
}
