//! Static registries
//!
//! Per-environment DVN contract addresses, endpoint ids, RPC provider URLs
//! and signer descriptor lists. Everything is loaded once from the data
//! directory and read-only afterwards.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{ChainTarget, Environment, KeyScheme, SignerDescriptor, SignerMode};

/// Chains addressed by their V2 endpoint id (reduced modulo 30000)
pub const V2_VID_CHAINS: &[&str] = &["solana", "ton", "initia", "movement", "sui", "starknet"];

/// V2 endpoint ids live in a namespace offset by this amount
pub const VID_MODULO: u32 = 30_000;

/// Built-in V1 endpoint ids (mainnet)
const MAINNET_V1: &[(&str, u32)] = &[
    ("ethereum", 101),
    ("bsc", 102),
    ("avalanche", 106),
    ("aptos", 108),
    ("polygon", 109),
    ("arbitrum", 110),
    ("optimism", 111),
    ("fantom", 112),
    ("celo", 125),
    ("moonbeam", 126),
    ("gnosis", 145),
    ("metis", 151),
    ("zksync", 165),
    ("kava", 177),
    ("mantle", 181),
    ("linea", 183),
    ("base", 184),
    ("scroll", 214),
];

/// Built-in V2 endpoint ids for chains that never had a V1 deployment
const MAINNET_V2_ONLY: &[(&str, u32)] = &[
    ("solana", 30168),
    ("movement", 30325),
    ("initia", 30326),
    ("ton", 30343),
    ("sui", 30378),
    ("starknet", 30500),
];

const TESTNET_V1: &[(&str, u32)] = &[
    ("bsc-testnet", 10102),
    ("fuji", 10106),
    ("aptos", 10108),
    ("sepolia", 10161),
    ("arbitrum-sepolia", 10231),
    ("optimism-sepolia", 10232),
    ("base-sepolia", 10245),
];

const TESTNET_V2_ONLY: &[(&str, u32)] = &[
    ("solana", 40168),
    ("movement", 40325),
    ("initia", 40326),
    ("ton", 40343),
    ("sui", 40378),
    ("starknet", 40500),
];

/// Endpoint-id override for one chain
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainOverride {
    pub v1_eid: Option<u32>,
    pub v2_eid: Option<u32>,
    pub key_scheme: Option<KeyScheme>,
}

/// Endpoint ids known for a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointIds {
    pub v1: Option<u32>,
    pub v2: Option<u32>,
}

/// Built-in endpoint ids for `chain` in `environment`
pub fn builtin_endpoint_ids(chain: &str, environment: Environment) -> EndpointIds {
    let (v1_table, v2_only, v2_offset) = match environment {
        Environment::Mainnet => (MAINNET_V1, MAINNET_V2_ONLY, 30_000),
        Environment::Testnet => (TESTNET_V1, TESTNET_V2_ONLY, 30_000),
        Environment::Sandbox => (&[][..], &[][..], 0),
    };

    let v1 = v1_table.iter().find(|(name, _)| *name == chain).map(|(_, eid)| *eid);
    let v2 = v2_only
        .iter()
        .find(|(name, _)| *name == chain)
        .map(|(_, eid)| *eid)
        .or_else(|| v1.filter(|_| v2_offset > 0).map(|eid| eid + v2_offset));
    EndpointIds { v1, v2 }
}

/// Validator id for a chain: V2 id modulo 30000 for the non-EVM namespace,
/// V1 id for everything else.
pub fn vid_for(chain: &str, ids: EndpointIds) -> Option<u32> {
    if V2_VID_CHAINS.contains(&chain) {
        ids.v2.map(|eid| eid % VID_MODULO)
    } else {
        ids.v1
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ProviderEntry {
    uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KmsKeyEntry {
    key_id: String,
    region: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MnemonicSecretEntry {
    secret_name: String,
    region: String,
}

#[derive(Deserialize)]
struct RawMnemonicEntry {
    mnemonic: String,
    path: String,
}

/// Loaded registries for one environment
#[derive(Debug, Clone)]
pub struct Registry {
    environment: Environment,
    dvn_addresses: HashMap<String, String>,
    providers: HashMap<String, Vec<String>>,
    overrides: HashMap<String, ChainOverride>,
}

impl Registry {
    /// Load every registry file for `environment` from `data_dir`.
    /// Provider and override files are optional.
    pub fn load(data_dir: &Path, environment: Environment) -> GovernanceResult<Self> {
        let env = environment.as_str();
        let dvn_addresses: HashMap<String, String> =
            read_json(&data_dir.join(format!("dvn-addresses-{}.json", env)))?;

        let providers_path = data_dir.join("providers").join(env).join("providers.json");
        let providers: HashMap<String, ProviderEntry> = if providers_path.exists() {
            read_json(&providers_path)?
        } else {
            HashMap::new()
        };

        let overrides_path = data_dir.join("chain-overrides.json");
        let mut all_overrides: HashMap<String, HashMap<String, ChainOverride>> = if overrides_path.exists() {
            read_json(&overrides_path)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            environment,
            dvn_addresses,
            providers: providers.into_iter().map(|(chain, entry)| (chain, entry.uris)).collect(),
            overrides: all_overrides.remove(env).unwrap_or_default(),
        })
    }

    /// Build a registry in memory
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            dvn_addresses: HashMap::new(),
            providers: HashMap::new(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_dvn_address(mut self, chain: &str, address: &str) -> Self {
        self.dvn_addresses.insert(chain.to_string(), address.to_string());
        self
    }

    pub fn with_provider(mut self, chain: &str, uri: &str) -> Self {
        self.providers.entry(chain.to_string()).or_default().push(uri.to_string());
        self
    }

    pub fn with_override(mut self, chain: &str, chain_override: ChainOverride) -> Self {
        self.overrides.insert(chain.to_string(), chain_override);
        self
    }

    /// Endpoint ids for a chain, overrides taking precedence
    pub fn endpoint_ids(&self, chain: &str) -> EndpointIds {
        let builtin = builtin_endpoint_ids(chain, self.environment);
        match self.overrides.get(chain) {
            Some(o) => EndpointIds {
                v1: o.v1_eid.or(builtin.v1),
                v2: o.v2_eid.or(builtin.v2),
            },
            None => builtin,
        }
    }

    /// Resolve a chain name to its target, failing on any missing entry
    pub fn resolve_target(&self, chain: &str) -> GovernanceResult<ChainTarget> {
        let chain = chain.trim();
        if chain.is_empty() {
            return Err(GovernanceError::unknown_chain(chain));
        }

        let ids = self.endpoint_ids(chain);
        let address = match self.dvn_addresses.get(chain) {
            Some(address) => address,
            None if ids.v1.is_none() && ids.v2.is_none() => return Err(GovernanceError::unknown_chain(chain)),
            None => {
                return Err(GovernanceError::missing_registry_entry(
                    "DVN address",
                    chain,
                    self.environment.as_str(),
                ))
            }
        };

        let vid = vid_for(chain, ids)
            .ok_or_else(|| GovernanceError::missing_registry_entry("endpoint id", chain, self.environment.as_str()))?;

        let key_scheme = self
            .overrides
            .get(chain)
            .and_then(|o| o.key_scheme)
            .unwrap_or_default();

        Ok(ChainTarget::new(chain, address.clone(), vid).with_key_scheme(key_scheme))
    }

    /// First configured RPC provider for a chain
    pub fn provider_url(&self, chain: &str) -> GovernanceResult<Url> {
        let uri = self
            .providers
            .get(chain)
            .and_then(|uris| uris.first())
            .ok_or_else(|| GovernanceError::missing_registry_entry("RPC provider", chain, self.environment.as_str()))?;

        let url = Url::parse(uri)
            .map_err(|e| GovernanceError::invalid_input(format!("Invalid provider URL for {}: {}", chain, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(GovernanceError::invalid_input(format!(
                "Provider URL for {} must be http(s), got {}",
                chain, other
            ))),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }
}

/// Signer descriptors for a signer mode, read from the data directory
pub fn load_signers(data_dir: &Path, environment: Environment, mode: SignerMode) -> GovernanceResult<Vec<SignerDescriptor>> {
    let env = environment.as_str();
    let signers: Vec<SignerDescriptor> = match mode {
        SignerMode::Custodial => {
            let entries: Vec<KmsKeyEntry> = read_json(&data_dir.join(format!("kms-keyids-{}.json", env)))?;
            entries
                .into_iter()
                .map(|e| SignerDescriptor::custodial(e.key_id, e.region))
                .collect()
        }
        SignerMode::DerivedMnemonic => {
            let entries: Vec<MnemonicSecretEntry> =
                read_json(&data_dir.join(format!("mnemonic-secret-infos-{}.json", env)))?;
            entries
                .into_iter()
                .map(|e| SignerDescriptor::derived_mnemonic(e.secret_name, e.region))
                .collect()
        }
        SignerMode::RawMnemonic => {
            let entries: Vec<RawMnemonicEntry> = read_json(&data_dir.join("mnemonic.json"))?;
            entries
                .into_iter()
                .map(|e| SignerDescriptor::raw_mnemonic(e.mnemonic, e.path))
                .collect()
        }
    };

    if signers.is_empty() {
        return Err(GovernanceError::invalid_input(format!("No signers configured for mode {:?}", mode)));
    }
    Ok(signers)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> GovernanceResult<T> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| GovernanceError::from(e).with_details(path.display().to_string()))?;
    serde_json::from_str(&contents).map_err(|e| GovernanceError::from(e).with_details(path.display().to_string()))
}
