//! Shared types for DVN governance payloads
//!
//! The request aggregate and everything a chain pipeline produces. All of
//! it is created fresh per invocation and never mutated once built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::error::{GovernanceError, GovernanceResult};
use crate::utils::crypto::{keccak256, to_hex_prefixed};

// =============================================================================
// Environment & chain families
// =============================================================================

/// Deployment stage the registries are keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Mainnet,
    Testnet,
    Sandbox,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Mainnet => "mainnet",
            Environment::Testnet => "testnet",
            Environment::Sandbox => "sandbox",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" => Ok(Environment::Mainnet),
            "testnet" => Ok(Environment::Testnet),
            "sandbox" => Ok(Environment::Sandbox),
            other => Err(GovernanceError::invalid_input(format!("Unknown environment: {}", other))),
        }
    }
}

/// Chain families with a distinct call-data / digest convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainFamily {
    Evm,
    Solana,
    MoveVm,
    Ton,
    Starknet,
}

impl ChainFamily {
    /// Family of a chain name; anything not named here is EVM-based.
    pub fn of(chain_name: &str) -> Self {
        match chain_name {
            "solana" => ChainFamily::Solana,
            "ton" => ChainFamily::Ton,
            "aptos" | "initia" | "movement" | "sui" => ChainFamily::MoveVm,
            "starknet" => ChainFamily::Starknet,
            _ => ChainFamily::Evm,
        }
    }

    pub fn is_evm(&self) -> bool {
        matches!(self, ChainFamily::Evm)
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainFamily::Evm => "evm",
            ChainFamily::Solana => "solana",
            ChainFamily::MoveVm => "move-vm",
            ChainFamily::Ton => "ton",
            ChainFamily::Starknet => "starknet",
        };
        f.write_str(name)
    }
}

/// Curve the signature for a chain is produced on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyScheme {
    #[default]
    Secp256k1,
    Ed25519,
}

// =============================================================================
// Governance operation
// =============================================================================

/// Role granted to message libraries on EVM DVNs
pub const MESSAGE_LIB_ROLE_NAME: &str = "MESSAGE_LIB_ROLE";

/// The governance change being authorized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GovernanceOperation {
    /// Add (`active = true`) or remove a signer
    #[serde(rename_all = "camelCase")]
    SetSigner { signer_address: String, active: bool },
    /// Change the signature quorum
    #[serde(rename_all = "camelCase")]
    SetQuorum { new_quorum: u64 },
    /// Grant (`grant = true`) or revoke a role for an account
    #[serde(rename_all = "camelCase")]
    SetRole {
        #[serde(with = "crate::serde_hex::prefixed32")]
        role_id: [u8; 32],
        account: String,
        grant: bool,
    },
}

impl GovernanceOperation {
    pub fn add_signer(signer_address: impl Into<String>) -> Self {
        GovernanceOperation::SetSigner { signer_address: signer_address.into(), active: true }
    }

    pub fn remove_signer(signer_address: impl Into<String>) -> Self {
        GovernanceOperation::SetSigner { signer_address: signer_address.into(), active: false }
    }

    pub fn set_quorum(new_quorum: u64) -> Self {
        GovernanceOperation::SetQuorum { new_quorum }
    }

    /// Grant or revoke `keccak256("MESSAGE_LIB_ROLE")` for a message library
    pub fn message_lib_role(account: impl Into<String>, grant: bool) -> Self {
        GovernanceOperation::SetRole {
            role_id: keccak256(MESSAGE_LIB_ROLE_NAME.as_bytes()),
            account: account.into(),
            grant,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GovernanceOperation::SetSigner { .. } => "set-signer",
            GovernanceOperation::SetQuorum { .. } => "set-quorum",
            GovernanceOperation::SetRole { grant: true, .. } => "grant-role",
            GovernanceOperation::SetRole { grant: false, .. } => "revoke-role",
        }
    }
}

// =============================================================================
// Targets, call-data, digests
// =============================================================================

/// One deployed DVN the request is signed for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTarget {
    pub chain_name: String,
    pub family: ChainFamily,
    pub contract_address: String,
    pub vid: u32,
    #[serde(default)]
    pub key_scheme: KeyScheme,
}

impl ChainTarget {
    pub fn new(chain_name: impl Into<String>, contract_address: impl Into<String>, vid: u32) -> Self {
        let chain_name = chain_name.into();
        Self {
            family: ChainFamily::of(&chain_name),
            chain_name,
            contract_address: contract_address.into(),
            vid,
            key_scheme: KeyScheme::Secp256k1,
        }
    }

    pub fn with_key_scheme(mut self, key_scheme: KeyScheme) -> Self {
        self.key_scheme = key_scheme;
        self
    }
}

/// Starknet call kept typed until hashing, so felts, u32s and u256s are
/// each widened by their own rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "functionName")]
pub enum StarknetCall {
    #[serde(rename = "set_signer", rename_all = "camelCase")]
    SetSigner { signer_address: String, active: bool },
    #[serde(rename = "set_threshold")]
    SetThreshold { threshold: u64 },
}

impl StarknetCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            StarknetCall::SetSigner { .. } => "set_signer",
            StarknetCall::SetThreshold { .. } => "set_threshold",
        }
    }
}

/// Chain-native call-data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallData {
    Bytes(#[serde(with = "crate::serde_hex::prefixed")] Vec<u8>),
    Structured(StarknetCall),
}

impl CallData {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CallData::Bytes(bytes) => Some(bytes),
            CallData::Structured(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CallData::Bytes(bytes) => bytes.len(),
            CallData::Structured(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The 32-byte value signers authorize
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(#[serde(with = "crate::serde_hex::prefixed32")] pub [u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        to_hex_prefixed(&self.0)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// =============================================================================
// Signatures & signers
// =============================================================================

/// A signature plus the identity used to order it in a quorum payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "crate::serde_hex::prefixed")]
    pub signature: Vec<u8>,
    pub address: String,
}

impl Signature {
    pub fn new(signature: Vec<u8>, address: impl Into<String>) -> Self {
        Self { signature, address: address.into() }
    }

    pub fn signature_hex(&self) -> String {
        to_hex_prefixed(&self.signature)
    }
}

/// Where a signer's key lives. No key material is held here except the
/// raw phrase of a local signer, which is zeroized on drop.
#[derive(Clone)]
pub enum SignerDescriptor {
    Custodial { key_id: String, region: String },
    DerivedMnemonic { secret_name: String, region: String },
    RawMnemonic { phrase: Zeroizing<String>, derivation_path: String },
}

impl SignerDescriptor {
    pub fn custodial(key_id: impl Into<String>, region: impl Into<String>) -> Self {
        SignerDescriptor::Custodial { key_id: key_id.into(), region: region.into() }
    }

    pub fn derived_mnemonic(secret_name: impl Into<String>, region: impl Into<String>) -> Self {
        SignerDescriptor::DerivedMnemonic { secret_name: secret_name.into(), region: region.into() }
    }

    pub fn raw_mnemonic(phrase: impl Into<String>, derivation_path: impl Into<String>) -> Self {
        SignerDescriptor::RawMnemonic {
            phrase: Zeroizing::new(phrase.into()),
            derivation_path: derivation_path.into(),
        }
    }

    pub fn mode(&self) -> SignerMode {
        match self {
            SignerDescriptor::Custodial { .. } => SignerMode::Custodial,
            SignerDescriptor::DerivedMnemonic { .. } => SignerMode::DerivedMnemonic,
            SignerDescriptor::RawMnemonic { .. } => SignerMode::RawMnemonic,
        }
    }
}

impl fmt::Debug for SignerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerDescriptor::Custodial { key_id, region } => f
                .debug_struct("Custodial")
                .field("key_id", key_id)
                .field("region", region)
                .finish(),
            SignerDescriptor::DerivedMnemonic { secret_name, region } => f
                .debug_struct("DerivedMnemonic")
                .field("secret_name", secret_name)
                .field("region", region)
                .finish(),
            SignerDescriptor::RawMnemonic { derivation_path, .. } => f
                .debug_struct("RawMnemonic")
                .field("phrase", &"[REDACTED]")
                .field("derivation_path", derivation_path)
                .finish(),
        }
    }
}

/// Signer-mode selector accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerMode {
    Custodial,
    DerivedMnemonic,
    RawMnemonic,
}

impl FromStr for SignerMode {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "kms" | "custodial" => Ok(SignerMode::Custodial),
            "mnemonic" | "derived-mnemonic" => Ok(SignerMode::DerivedMnemonic),
            "local" | "raw-mnemonic" => Ok(SignerMode::RawMnemonic),
            other => Err(GovernanceError::invalid_signer_mode(other)),
        }
    }
}

// =============================================================================
// Quorum payloads
// =============================================================================

/// Chain-specific serialized signature set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuorumPayload {
    /// Concatenated raw signatures (EVM and Move families)
    Packed(#[serde(with = "crate::serde_hex::prefixed")] Vec<u8>),
    /// Individual hex signatures (Solana, Starknet)
    List(Vec<String>),
    /// Signatures keyed by signer address (TON)
    Keyed(Vec<Signature>),
}

impl QuorumPayload {
    /// Number of signatures carried
    pub fn signature_count(&self, signature_len: usize) -> usize {
        match self {
            QuorumPayload::Packed(bytes) if signature_len > 0 => bytes.len() / signature_len,
            QuorumPayload::Packed(_) => 0,
            QuorumPayload::List(items) => items.len(),
            QuorumPayload::Keyed(items) => items.len(),
        }
    }
}

// =============================================================================
// Request aggregate
// =============================================================================

/// What to do when one chain's pipeline fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// First fatal error aborts the batch and nothing is written
    #[default]
    AllOrNothing,
    /// Every chain is recorded with an ok/error status
    Partial,
}

impl FromStr for FailurePolicy {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all-or-nothing" => Ok(FailurePolicy::AllOrNothing),
            "partial" => Ok(FailurePolicy::Partial),
            other => Err(GovernanceError::invalid_input(format!(
                "Failure policy must be all-or-nothing or partial, got '{}'",
                other
            ))),
        }
    }
}

/// One invocation: an operation signed for several chains
#[derive(Debug, Clone)]
pub struct GovernanceRequest {
    pub environment: Environment,
    pub operation: GovernanceOperation,
    pub targets: Vec<ChainTarget>,
    pub quorum: usize,
    pub expiration: u64,
    pub signers: Vec<SignerDescriptor>,
}

impl GovernanceRequest {
    pub fn new(
        environment: Environment,
        operation: GovernanceOperation,
        targets: Vec<ChainTarget>,
        quorum: usize,
        expiration: u64,
        signers: Vec<SignerDescriptor>,
    ) -> GovernanceResult<Self> {
        if targets.is_empty() {
            return Err(GovernanceError::invalid_input("At least one chain is required"));
        }
        if signers.is_empty() {
            return Err(GovernanceError::invalid_input("At least one signer is required"));
        }
        if quorum == 0 {
            return Err(GovernanceError::invalid_input("Quorum must be at least 1"));
        }
        Ok(Self { environment, operation, targets, quorum, expiration, signers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_dispatch() {
        assert_eq!(ChainFamily::of("ethereum"), ChainFamily::Evm);
        assert_eq!(ChainFamily::of("arbitrum"), ChainFamily::Evm);
        assert_eq!(ChainFamily::of("solana"), ChainFamily::Solana);
        assert_eq!(ChainFamily::of("sui"), ChainFamily::MoveVm);
        assert_eq!(ChainFamily::of("aptos"), ChainFamily::MoveVm);
        assert_eq!(ChainFamily::of("ton"), ChainFamily::Ton);
        assert_eq!(ChainFamily::of("starknet"), ChainFamily::Starknet);
    }

    #[test]
    fn test_message_lib_role_id() {
        match GovernanceOperation::message_lib_role("0x01", true) {
            GovernanceOperation::SetRole { role_id, .. } => assert_eq!(
                hex::encode(role_id),
                "724aface199fe5bed93ae8508474576a9adf3dc443b2c451842a2242919f19de"
            ),
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_signer_mode_selector() {
        assert_eq!("kms".parse::<SignerMode>().unwrap(), SignerMode::Custodial);
        assert_eq!("mnemonic".parse::<SignerMode>().unwrap(), SignerMode::DerivedMnemonic);
        assert_eq!("raw-mnemonic".parse::<SignerMode>().unwrap(), SignerMode::RawMnemonic);
        let err = "ledger".parse::<SignerMode>().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidSignerMode);
        assert!(err.message.contains("ledger"));
    }

    #[test]
    fn test_starknet_call_json_shape() {
        let call = StarknetCall::SetSigner { signer_address: "0xabc".into(), active: true };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["functionName"], "set_signer");
        assert_eq!(json["signerAddress"], "0xabc");
        assert_eq!(json["active"], true);

        let call = StarknetCall::SetThreshold { threshold: 2 };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["functionName"], "set_threshold");
        assert_eq!(json["threshold"], 2);
    }

    #[test]
    fn test_raw_mnemonic_debug_is_redacted() {
        let descriptor = SignerDescriptor::raw_mnemonic("test test junk", "m/44'/60'/0'/0/0");
        let shown = format!("{:?}", descriptor);
        assert!(!shown.contains("junk"));
        assert!(shown.contains("REDACTED"));
    }

    #[test]
    fn test_request_validation() {
        let target = ChainTarget::new("ethereum", "0x1111111111111111111111111111111111111111", 101);
        let signer = SignerDescriptor::custodial("key", "us-east-1");
        let op = GovernanceOperation::set_quorum(2);

        assert!(GovernanceRequest::new(Environment::Mainnet, op.clone(), vec![], 1, 0, vec![signer.clone()]).is_err());
        assert!(GovernanceRequest::new(Environment::Mainnet, op.clone(), vec![target.clone()], 0, 0, vec![signer.clone()]).is_err());
        assert!(GovernanceRequest::new(Environment::Mainnet, op, vec![target], 1, 0, vec![signer]).is_ok());
    }

    #[test]
    fn test_quorum_payload_serialization() {
        let packed = QuorumPayload::Packed(vec![0xaa, 0xbb]);
        assert_eq!(serde_json::to_value(&packed).unwrap(), "0xaabb");

        let list = QuorumPayload::List(vec!["0x01".into()]);
        assert_eq!(serde_json::to_value(&list).unwrap(), serde_json::json!(["0x01"]));
    }
}
