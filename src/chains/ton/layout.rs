//! Storage and message classes of the TON DVN contracts
//!
//! Every class starts with an 80-bit class name (ASCII, left zero-padded).
//!
//! ```text
//! Dvn        name | quorum u64 | setQuorumNonce u64 | setVerifiersNonce u64 | ^WorkerCore | ^verifiers
//! Proxy      name | ^WorkerCore
//! WorkerCore name | ^admins
//! SetDict    name | nonce u64 | opcode u32 | target u256 | ^dict
//! SetQuorum  name | nonce u64 | opcode u32 | quorum u64 | target u256
//! ```

use std::sync::Arc;

use super::address::{TonAddress, BASE_WORKCHAIN};
use super::cell::{Cell, CellBuilder, CellError, CellSlice};
use super::dict::Dict256;
use crate::error::{GovernanceError, GovernanceResult};

pub const NAME_BITS: usize = 80;

pub const DVN_CLASS: &str = "Dvn";
pub const PROXY_CLASS: &str = "Proxy";
pub const WORKER_CORE_CLASS: &str = "WorkerCore";
pub const SET_DICT_CLASS: &str = "SetDict";
pub const SET_QUORUM_CLASS: &str = "SetQuorum";

pub const OP_SET_VERIFIERS: &str = "Dvn::OP::SET_VERIFIERS";
pub const OP_SET_QUORUM: &str = "Dvn::OP::SET_QUORUM";

/// Opcode derived from its symbolic name (CRC-32)
pub fn opcode(name: &str) -> u32 {
    crc32fast::hash(name.as_bytes())
}

pub fn class_name(cell: &Cell) -> GovernanceResult<String> {
    read_name(&mut cell.parse())
}

fn read_name(slice: &mut CellSlice<'_>) -> GovernanceResult<String> {
    let bytes = slice.load_bytes(NAME_BITS / 8)?;
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[start..].to_vec())
        .map_err(|_| GovernanceError::rpc("Contract class name is not ASCII"))
}

fn expect_class(slice: &mut CellSlice<'_>, expected: &str) -> GovernanceResult<()> {
    let name = read_name(slice)?;
    if name != expected {
        return Err(GovernanceError::rpc(format!("Expected a {} storage cell, found '{}'", expected, name)));
    }
    Ok(())
}

fn store_name(builder: &mut CellBuilder, name: &str) -> Result<(), CellError> {
    let mut padded = [0u8; NAME_BITS / 8];
    let bytes = name.as_bytes();
    if bytes.len() > padded.len() {
        return Err(CellError::BitOverflow(bytes.len() * 8));
    }
    padded[NAME_BITS / 8 - bytes.len()..].copy_from_slice(bytes);
    builder.store_bytes(&padded)?;
    Ok(())
}

/// Decoded DVN storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DvnStorage {
    pub quorum: u64,
    pub set_quorum_nonce: u64,
    pub set_verifiers_nonce: u64,
    pub verifiers: Dict256,
}

impl DvnStorage {
    pub fn decode(cell: &Cell) -> GovernanceResult<Self> {
        let mut slice = cell.parse();
        expect_class(&mut slice, DVN_CLASS)?;
        let quorum = slice.load_uint(64)?;
        let set_quorum_nonce = slice.load_uint(64)?;
        let set_verifiers_nonce = slice.load_uint(64)?;
        let _worker_core = slice.load_ref()?;
        let verifiers_root = slice.load_ref()?;
        let verifiers = Dict256::from_cell(&verifiers_root)?;
        Ok(Self { quorum, set_quorum_nonce, set_verifiers_nonce, verifiers })
    }

    pub fn encode(&self, worker_core: Arc<Cell>) -> GovernanceResult<Cell> {
        let mut b = CellBuilder::new();
        store_name(&mut b, DVN_CLASS)?;
        b.store_uint(self.quorum, 64)?
            .store_uint(self.set_quorum_nonce, 64)?
            .store_uint(self.set_verifiers_nonce, 64)?
            .store_ref(worker_core)?
            .store_ref(Arc::new(self.verifiers.to_cell()?))?;
        Ok(b.build())
    }
}

/// `admins[0]` of a proxy, or `None` when `cell` is not proxy storage
pub fn proxy_admin(cell: &Cell) -> GovernanceResult<Option<TonAddress>> {
    let mut slice = cell.parse();
    if read_name(&mut slice)? != PROXY_CLASS {
        return Ok(None);
    }

    let worker_core = slice.load_ref()?;
    let mut core = worker_core.parse();
    expect_class(&mut core, WORKER_CORE_CLASS)?;
    let admins_root = core.load_ref()?;
    let admins = Dict256::from_cell(&admins_root)?;

    let first = admins
        .keys()
        .next()
        .ok_or_else(|| GovernanceError::state_invariant("Proxy has no admins"))?;
    Ok(Some(TonAddress::new(BASE_WORKCHAIN, *first)))
}

pub fn worker_core(admins: &Dict256) -> GovernanceResult<Cell> {
    let mut b = CellBuilder::new();
    store_name(&mut b, WORKER_CORE_CLASS)?;
    b.store_ref(Arc::new(admins.to_cell()?))?;
    Ok(b.build())
}

pub fn proxy(worker_core: Arc<Cell>) -> GovernanceResult<Cell> {
    let mut b = CellBuilder::new();
    store_name(&mut b, PROXY_CLASS)?;
    b.store_ref(worker_core)?;
    Ok(b.build())
}

pub fn set_dict_message(nonce: u64, opcode: u32, target: &TonAddress, dict: &Dict256) -> GovernanceResult<Cell> {
    let mut b = CellBuilder::new();
    store_name(&mut b, SET_DICT_CLASS)?;
    b.store_uint(nonce, 64)?
        .store_uint(u64::from(opcode), 32)?
        .store_bytes(&target.hash)?
        .store_ref(Arc::new(dict.to_cell()?))?;
    Ok(b.build())
}

pub fn set_quorum_message(nonce: u64, opcode: u32, quorum: u64, target: &TonAddress) -> GovernanceResult<Cell> {
    let mut b = CellBuilder::new();
    store_name(&mut b, SET_QUORUM_CLASS)?;
    b.store_uint(nonce, 64)?
        .store_uint(u64::from(opcode), 32)?
        .store_uint(quorum, 64)?
        .store_bytes(&target.hash)?;
    Ok(b.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcodes_are_crc32() {
        assert_eq!(opcode("a"), 0xe8b7be43);
        assert_ne!(opcode(OP_SET_VERIFIERS), opcode(OP_SET_QUORUM));
    }

    #[test]
    fn test_storage_round_trip() {
        let mut verifiers = Dict256::new();
        verifiers.insert([7u8; 32], Arc::new(Cell::empty()));
        let storage = DvnStorage { quorum: 2, set_quorum_nonce: 5, set_verifiers_nonce: 9, verifiers };

        let core = Arc::new(worker_core(&Dict256::new()).unwrap());
        let cell = storage.encode(core).unwrap();
        assert_eq!(class_name(&cell).unwrap(), "Dvn");
        assert_eq!(DvnStorage::decode(&cell).unwrap(), storage);
        assert_eq!(proxy_admin(&cell).unwrap(), None);
    }

    #[test]
    fn test_proxy_admin_is_smallest_key() {
        let mut admins = Dict256::new();
        admins.insert([9u8; 32], Arc::new(Cell::empty()));
        admins.insert([2u8; 32], Arc::new(Cell::empty()));
        let cell = proxy(Arc::new(worker_core(&admins).unwrap())).unwrap();

        assert_eq!(class_name(&cell).unwrap(), PROXY_CLASS);
        assert_eq!(proxy_admin(&cell).unwrap(), Some(TonAddress::new(0, [2u8; 32])));
    }

    #[test]
    fn test_proxy_without_admins_fails() {
        let cell = proxy(Arc::new(worker_core(&Dict256::new()).unwrap())).unwrap();
        assert!(proxy_admin(&cell).is_err());
    }

    #[test]
    fn test_decode_rejects_other_classes() {
        let cell = set_quorum_message(1, opcode(OP_SET_QUORUM), 2, &TonAddress::new(0, [1u8; 32])).unwrap();
        assert_eq!(class_name(&cell).unwrap(), SET_QUORUM_CLASS);
        assert!(DvnStorage::decode(&cell).is_err());
    }
}
