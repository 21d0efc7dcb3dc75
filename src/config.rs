//! Run settings
//!
//! Resolved once in the binary from flags and environment variables, then
//! handed to the orchestrator read-only.

use std::path::PathBuf;

use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{Environment, FailurePolicy, GovernanceOperation};

/// Default signature validity window
pub const DEFAULT_EXPIRATION_WINDOW_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Endpoint override for the custodial signing service
pub const KMS_ENDPOINT_ENV: &str = "DVN_KMS_ENDPOINT";
/// Endpoint override for the secret store
pub const SECRETS_ENDPOINT_ENV: &str = "DVN_SECRETS_ENDPOINT";

/// Settings shared by every subcommand
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub data_dir: PathBuf,
    pub output: PathBuf,
    pub expiration: u64,
    pub failure_policy: FailurePolicy,
    pub kms_endpoint: Option<String>,
    pub secrets_endpoint: Option<String>,
}

impl Settings {
    /// Resolve settings; unset values fall back to their defaults
    pub fn resolve(
        environment: Environment,
        data_dir: PathBuf,
        output: Option<PathBuf>,
        expiration: Option<u64>,
        failure_policy: FailurePolicy,
        operation: &GovernanceOperation,
    ) -> Self {
        Self {
            environment,
            data_dir,
            output: output.unwrap_or_else(|| PathBuf::from(default_output_file(operation))),
            expiration: expiration.unwrap_or_else(default_expiration),
            failure_policy,
            kms_endpoint: non_empty_env(KMS_ENDPOINT_ENV),
            secrets_endpoint: non_empty_env(SECRETS_ENDPOINT_ENV),
        }
    }
}

/// Output file name per operation
pub fn default_output_file(operation: &GovernanceOperation) -> &'static str {
    match operation {
        GovernanceOperation::SetSigner { .. } => "signer-change-payloads.json",
        GovernanceOperation::SetQuorum { .. } => "quorum-change-payloads.json",
        GovernanceOperation::SetRole { grant: true, .. } => "grant-role-payloads.json",
        GovernanceOperation::SetRole { grant: false, .. } => "revoke-role-payloads.json",
    }
}

/// Now plus one week, in milliseconds
pub fn default_expiration() -> u64 {
    let now = chrono::Utc::now().timestamp_millis();
    (now + DEFAULT_EXPIRATION_WINDOW_MS).max(0) as u64
}

/// Strict 0/1 flag. `name` is echoed back in the error.
pub fn parse_binary_flag(value: u8, name: &str) -> GovernanceResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(GovernanceError::invalid_input(format!("{} must be 0 or 1, got {}", name, other))),
    }
}

/// Split a comma-separated chain list, dropping blanks and repeats
pub fn parse_chain_names(raw: &str) -> GovernanceResult<Vec<String>> {
    let mut chains: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !chains.iter().any(|c| c == name) {
            chains.push(name.to_string());
        }
    }
    if chains.is_empty() {
        return Err(GovernanceError::invalid_input("No chain names given"));
    }
    Ok(chains)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_files() {
        assert_eq!(
            default_output_file(&GovernanceOperation::add_signer("0x1")),
            "signer-change-payloads.json"
        );
        assert_eq!(default_output_file(&GovernanceOperation::set_quorum(2)), "quorum-change-payloads.json");
        assert_eq!(
            default_output_file(&GovernanceOperation::message_lib_role("0x1", false)),
            "revoke-role-payloads.json"
        );
    }

    #[test]
    fn test_default_expiration_is_a_week_out() {
        let now = chrono::Utc::now().timestamp_millis() as u64;
        let expiration = default_expiration();
        let window = DEFAULT_EXPIRATION_WINDOW_MS as u64;
        assert!(expiration >= now + window);
        assert!(expiration < now + window + 60_000);
    }

    #[test]
    fn test_binary_flag() {
        assert!(!parse_binary_flag(0, "shouldRevoke").unwrap());
        assert!(parse_binary_flag(1, "shouldRevoke").unwrap());
        let err = parse_binary_flag(2, "shouldRevoke").unwrap_err();
        assert!(err.message.contains("shouldRevoke"));
    }

    #[test]
    fn test_chain_names() {
        assert_eq!(
            parse_chain_names("ethereum, arbitrum,,ethereum").unwrap(),
            vec!["ethereum".to_string(), "arbitrum".to_string()]
        );
        assert!(parse_chain_names(" , ").is_err());
    }

    #[test]
    fn test_resolve_uses_explicit_values() {
        let settings = Settings::resolve(
            Environment::Testnet,
            PathBuf::from("data"),
            Some(PathBuf::from("out.json")),
            Some(42),
            FailurePolicy::Partial,
            &GovernanceOperation::set_quorum(1),
        );
        assert_eq!(settings.output, PathBuf::from("out.json"));
        assert_eq!(settings.expiration, 42);
        assert_eq!(settings.failure_policy, FailurePolicy::Partial);
    }
}
