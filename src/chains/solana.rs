//! Solana DVN adapter
//!
//! The DVN program id is the owner of the target account. Signer changes
//! are built by reading the program's config account and re-submitting
//! the full signer list with the change applied.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest as _, Sha256};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

use super::{call_data_bytes, role_unsupported, ChainAdapter};
use crate::error::{GovernanceError, GovernanceResult};
use crate::log_debug;
use crate::types::{CallData, ChainFamily, ChainTarget, Digest, GovernanceOperation};
use crate::utils::crypto::{decode_hex_lenient, keccak256};
use crate::utils::http::JsonRpcClient;

/// PDA seed of the DVN config account
pub const DVN_CONFIG_SEED: &[u8] = b"DvnConfig";

/// Multisig signers are uncompressed secp256k1 keys without the 0x04 tag
pub const SIGNER_KEY_LEN: usize = 64;

/// `AdminConfig` variant indices accepted by `set_config`
const CONFIG_VARIANT_QUORUM: u8 = 4;
const CONFIG_VARIANT_SIGNERS: u8 = 5;

/// Account owner and raw data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub owner: Pubkey,
    pub data: Vec<u8>,
}

/// Read-only account access
#[async_trait]
pub trait AccountReader: Send + Sync {
    async fn get_account(&self, address: &Pubkey) -> GovernanceResult<AccountInfo>;
}

#[derive(Deserialize)]
struct AccountInfoEnvelope {
    value: Option<RpcAccount>,
}

#[derive(Deserialize)]
struct RpcAccount {
    owner: String,
    data: (String, String),
}

/// `getAccountInfo` over Solana JSON-RPC
pub struct RpcAccountReader {
    rpc: JsonRpcClient,
}

impl RpcAccountReader {
    pub fn new(url: Url) -> GovernanceResult<Self> {
        Ok(Self { rpc: JsonRpcClient::new(url)? })
    }
}

#[async_trait]
impl AccountReader for RpcAccountReader {
    async fn get_account(&self, address: &Pubkey) -> GovernanceResult<AccountInfo> {
        let result = self
            .rpc
            .call(
                "getAccountInfo",
                json!([address.to_string(), {"encoding": "base64", "commitment": "confirmed"}]),
            )
            .await?;

        let envelope: AccountInfoEnvelope = serde_json::from_value(result)?;
        let account = envelope
            .value
            .ok_or_else(|| GovernanceError::rpc(format!("Account {} not found", address)))?;

        let owner = Pubkey::from_str(&account.owner)
            .map_err(|e| GovernanceError::rpc(format!("Invalid owner for {}: {}", address, e)))?;
        let (encoded, encoding) = account.data;
        if encoding != "base64" {
            return Err(GovernanceError::rpc(format!("Unexpected account encoding: {}", encoding)));
        }
        Ok(AccountInfo { owner, data: BASE64.decode(encoded)? })
    }
}

/// Multisig state from the DVN config account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DvnConfigState {
    pub vid: u32,
    pub signers: Vec<[u8; SIGNER_KEY_LEN]>,
    pub quorum: u8,
}

/// Anchor discriminator: first 8 bytes of `sha256("<namespace>:<name>")`
fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> GovernanceResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| GovernanceError::rpc("DVN config account data is truncated"))?;
        let out = &self.data[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    fn u8(&mut self) -> GovernanceResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> GovernanceResult<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }
}

/// Decode the config account:
/// `discriminator | vid u32 | bump u8 | default_multiplier_bps u16 | signers vec<[u8; 64]> | quorum u8 | ...`
pub fn parse_config(data: &[u8]) -> GovernanceResult<DvnConfigState> {
    let mut reader = Reader { data, offset: 0 };
    if reader.take(8)? != discriminator("account", "DvnConfig") {
        return Err(GovernanceError::rpc("Account is not a DVN config"));
    }

    let vid = reader.u32()?;
    let _bump = reader.u8()?;
    let _default_multiplier_bps = reader.take(2)?;

    let count = reader.u32()? as usize;
    let mut signers = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let mut key = [0u8; SIGNER_KEY_LEN];
        key.copy_from_slice(reader.take(SIGNER_KEY_LEN)?);
        signers.push(key);
    }
    let quorum = reader.u8()?;

    Ok(DvnConfigState { vid, signers, quorum })
}

/// New signer list: removal drops byte-exact matches, addition appends
pub fn apply_signer_change(
    current: &[[u8; SIGNER_KEY_LEN]],
    signer: &[u8; SIGNER_KEY_LEN],
    active: bool,
) -> Vec<[u8; SIGNER_KEY_LEN]> {
    let mut next: Vec<[u8; SIGNER_KEY_LEN]> = current.iter().filter(|s| active || *s != signer).copied().collect();
    if active {
        next.push(*signer);
    }
    next
}

fn set_config_instruction(variant: u8, body: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(9 + body.len());
    data.extend_from_slice(&discriminator("global", "set_config"));
    data.push(variant);
    data.extend_from_slice(body);
    data
}

pub fn set_signers_instruction(signers: &[[u8; SIGNER_KEY_LEN]]) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + signers.len() * SIGNER_KEY_LEN);
    body.extend_from_slice(&(signers.len() as u32).to_le_bytes());
    for signer in signers {
        body.extend_from_slice(signer);
    }
    set_config_instruction(CONFIG_VARIANT_SIGNERS, &body)
}

pub fn set_quorum_instruction(quorum: u8) -> Vec<u8> {
    set_config_instruction(CONFIG_VARIANT_QUORUM, &[quorum])
}

/// keccak256 of the borsh `ExecuteTransactionDigest`
/// (`vid u32 | program_id | accounts vec (empty) | data vec<u8> | expiration i64`)
pub fn execute_transaction_digest(vid: u32, program_id: &Pubkey, data: &[u8], expiration: i64) -> [u8; 32] {
    let mut encoded = Vec::with_capacity(4 + 32 + 4 + 4 + data.len() + 8);
    encoded.extend_from_slice(&vid.to_le_bytes());
    encoded.extend_from_slice(&program_id.to_bytes());
    encoded.extend_from_slice(&0u32.to_le_bytes());
    encoded.extend_from_slice(&(data.len() as u32).to_le_bytes());
    encoded.extend_from_slice(data);
    encoded.extend_from_slice(&expiration.to_le_bytes());
    keccak256(&encoded)
}

fn parse_pubkey(address: &str) -> GovernanceResult<Pubkey> {
    Pubkey::from_str(address.trim())
        .map_err(|e| GovernanceError::invalid_input(format!("Invalid Solana address '{}': {}", address, e)))
}

fn parse_signer_key(signer_address: &str) -> GovernanceResult<[u8; SIGNER_KEY_LEN]> {
    let bytes = decode_hex_lenient(signer_address)?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        GovernanceError::invalid_input(format!(
            "Solana signer must be a {}-byte public key, got {} bytes",
            SIGNER_KEY_LEN,
            v.len()
        ))
    })
}

pub struct SolanaAdapter {
    reader: Arc<dyn AccountReader>,
}

impl SolanaAdapter {
    pub fn new(reader: Arc<dyn AccountReader>) -> Self {
        Self { reader }
    }

    async fn program_id(&self, target: &ChainTarget) -> GovernanceResult<Pubkey> {
        let account = self.reader.get_account(&parse_pubkey(&target.contract_address)?).await?;
        Ok(account.owner)
    }
}

#[async_trait]
impl ChainAdapter for SolanaAdapter {
    fn family(&self) -> ChainFamily {
        ChainFamily::Solana
    }

    async fn build_call_data(&self, operation: &GovernanceOperation, target: &ChainTarget) -> GovernanceResult<CallData> {
        let program_id = self.program_id(target).await?;

        let data = match operation {
            GovernanceOperation::SetSigner { signer_address, active } => {
                let signer = parse_signer_key(signer_address)?;
                let (config_address, _) = Pubkey::find_program_address(&[DVN_CONFIG_SEED], &program_id);
                let config = parse_config(&self.reader.get_account(&config_address).await?.data)?;
                log_debug!(
                    "solana",
                    "Read DVN config",
                    program = program_id,
                    members = config.signers.len(),
                    quorum = config.quorum
                );
                set_signers_instruction(&apply_signer_change(&config.signers, &signer, *active))
            }
            GovernanceOperation::SetQuorum { new_quorum } => {
                let quorum = u8::try_from(*new_quorum).map_err(|_| {
                    GovernanceError::invalid_input(format!("Solana quorum must fit in a byte, got {}", new_quorum))
                })?;
                set_quorum_instruction(quorum)
            }
            GovernanceOperation::SetRole { .. } => return Err(role_unsupported(ChainFamily::Solana)),
        };
        Ok(CallData::Bytes(data))
    }

    async fn hash_call_data(&self, target: &ChainTarget, expiration: u64, call_data: &CallData) -> GovernanceResult<Digest> {
        let data = call_data_bytes(call_data, ChainFamily::Solana)?;
        let expiration = i64::try_from(expiration)
            .map_err(|_| GovernanceError::invalid_input(format!("Expiration {} overflows i64", expiration)))?;
        let program_id = self.program_id(target).await?;
        Ok(Digest(execute_transaction_digest(target.vid, &program_id, data, expiration)))
    }
}
