//! Unified error types for DVN governance payload generation
//!
//! Every failure in a chain pipeline flows through `GovernanceError` so the
//! orchestrator can report it with the offending identifier and decide
//! whether the batch aborts or records a per-chain failure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all governance operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl GovernanceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn unknown_chain(chain: &str) -> Self {
        Self::new(ErrorCode::UnknownChain, format!("Unknown chain: {}", chain))
    }

    pub fn missing_registry_entry(what: &str, chain: &str, environment: &str) -> Self {
        Self::new(
            ErrorCode::MissingRegistryEntry,
            format!("No {} registered for chain '{}' in environment '{}'", what, chain, environment),
        )
    }

    pub fn invalid_signer_mode(mode: &str) -> Self {
        Self::new(
            ErrorCode::InvalidSignerMode,
            format!("Signer mode must be kms, mnemonic or local, got '{}'", mode),
        )
    }

    pub fn quorum_too_large(quorum: usize, available: usize) -> Self {
        Self::new(
            ErrorCode::QuorumTooLarge,
            format!("Quorum {} exceeds the {} available signatures", quorum, available),
        )
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsupportedOperation, msg)
    }

    pub fn state_invariant(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::StateInvariant, msg)
    }

    pub fn secret_store(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SecretStore, msg)
    }

    pub fn custodial_signer(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CustodialSigner, msg)
    }

    pub fn rpc(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Rpc, msg)
    }

    pub fn der_parse(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DerParse, msg)
    }

    pub fn recovery_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RecoveryFailed, msg)
    }

    pub fn crypto_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CryptoError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Which of the four failure families this error belongs to
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// No failure is retried: configuration and invariant errors are
    /// deterministic, external failures surface to the operator and
    /// cryptographic failures indicate a bug.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl fmt::Display for GovernanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for GovernanceError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Configuration errors
    UnknownChain,
    MissingRegistryEntry,
    InvalidSignerMode,
    QuorumTooLarge,
    InvalidInput,
    UnsupportedOperation,

    // State invariant errors
    StateInvariant,

    // External dependency errors
    SecretStore,
    CustodialSigner,
    Rpc,
    Io,

    // Cryptographic errors
    DerParse,
    RecoveryFailed,
    CryptoError,

    // Parse errors
    JsonError,
    HexError,

    // Internal
    Internal,
}

/// Failure families a code falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    StateInvariant,
    ExternalDependency,
    Cryptographic,
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::UnknownChain
            | ErrorCode::MissingRegistryEntry
            | ErrorCode::InvalidSignerMode
            | ErrorCode::QuorumTooLarge
            | ErrorCode::InvalidInput
            | ErrorCode::UnsupportedOperation
            | ErrorCode::JsonError
            | ErrorCode::HexError => ErrorCategory::Configuration,
            ErrorCode::StateInvariant => ErrorCategory::StateInvariant,
            ErrorCode::SecretStore | ErrorCode::CustodialSigner | ErrorCode::Rpc | ErrorCode::Io => {
                ErrorCategory::ExternalDependency
            }
            ErrorCode::DerParse
            | ErrorCode::RecoveryFailed
            | ErrorCode::CryptoError
            | ErrorCode::Internal => ErrorCategory::Cryptographic,
        }
    }
}

/// Result type alias for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;

// Conversions from common error types

impl From<serde_json::Error> for GovernanceError {
    fn from(e: serde_json::Error) -> Self {
        GovernanceError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for GovernanceError {
    fn from(e: hex::FromHexError) -> Self {
        GovernanceError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<base64::DecodeError> for GovernanceError {
    fn from(e: base64::DecodeError) -> Self {
        GovernanceError::new(ErrorCode::InvalidInput, format!("Base64 error: {}", e))
    }
}

impl From<std::io::Error> for GovernanceError {
    fn from(e: std::io::Error) -> Self {
        GovernanceError::new(ErrorCode::Io, e.to_string())
    }
}

impl From<reqwest::Error> for GovernanceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GovernanceError::new(ErrorCode::Rpc, "Request timed out")
        } else if e.is_connect() {
            GovernanceError::new(ErrorCode::Rpc, "Connection failed").with_details(e.to_string())
        } else {
            GovernanceError::new(ErrorCode::Rpc, e.to_string())
        }
    }
}

impl From<bitcoin::bip32::Error> for GovernanceError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        GovernanceError::new(ErrorCode::CryptoError, format!("BIP32 error: {}", e))
    }
}

impl From<secp256k1::Error> for GovernanceError {
    fn from(e: secp256k1::Error) -> Self {
        GovernanceError::new(ErrorCode::CryptoError, format!("Secp256k1 error: {}", e))
    }
}

impl From<bip39::Error> for GovernanceError {
    fn from(e: bip39::Error) -> Self {
        GovernanceError::new(ErrorCode::InvalidInput, format!("BIP39 error: {}", e))
    }
}
