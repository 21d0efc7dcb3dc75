//! DVN Governance Core Library
//!
//! Produces quorum-signed payloads that change governance state (signer
//! set, quorum, roles) on DVN contracts deployed across EVM chains,
//! Solana, TON, the Move VM chains and Starknet.
//!
//! # Architecture
//!
//! - **chains**: per-family call-data encoding and canonical hashing
//! - **signer**: custody-agnostic signing and recoverable signatures
//! - **quorum**: per-family ordering and serialization of signature sets
//! - **orchestrator**: concurrent per-chain pipelines and the output file
//! - **registry** / **config**: static deployment data and run settings
//! - **aws**: the custodial signing service and the secret store
//!
//! # Security
//!
//! Seed phrases and derived keys live in `zeroize` wrappers and are cleared
//! on drop. Log entries redact anything that looks like key material.
//!
//! # Example
//!
//! ```rust,ignore
//! use dvn_governance::{GovernanceOperation, Orchestrator, Registry, Signers};
//!
//! let registry = Registry::load(data_dir, Environment::Mainnet)?;
//! let orchestrator = Orchestrator::new(registry, Arc::new(Signers::local()));
//! let report = orchestrator.run(&request).await?;
//! report.write(Path::new("signer-change-payloads.json"), FailurePolicy::AllOrNothing)?;
//! ```

pub mod abi;
pub mod aws;
pub mod chains;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod quorum;
pub mod registry;
pub mod serde_hex;
pub mod signer;
pub mod types;
pub mod utils;

pub use chains::{adapter_for, ChainAdapter};
pub use config::Settings;
pub use error::{ErrorCategory, ErrorCode, GovernanceError, GovernanceResult};
pub use orchestrator::{ChainPayload, Orchestrator, RunReport};
pub use registry::Registry;
pub use signer::{SignerBackend, Signers, SigningRequest};
pub use types::{
    CallData, ChainFamily, ChainTarget, Digest, Environment, FailurePolicy, GovernanceOperation, GovernanceRequest,
    KeyScheme, QuorumPayload, Signature, SignerDescriptor, SignerMode,
};
pub use utils::crypto::{keccak256, to_checksum_address};
