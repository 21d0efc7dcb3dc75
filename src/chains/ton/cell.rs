//! TON cells
//!
//! Ordinary (level 0) cells only: a builder that computes the
//! representation hash, a reader, and bag-of-cells encoding.

use sha2::{Digest as _, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{ErrorCode, GovernanceError};

pub const MAX_BITS: usize = 1023;
pub const MAX_REFS: usize = 4;

const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CellError {
    #[error("Cell overflow: cannot store {0} more bits")]
    BitOverflow(usize),
    #[error("Cell overflow: more than 4 references")]
    RefOverflow,
    #[error("Cell underflow: {0}")]
    Underflow(&'static str),
    #[error("Invalid bag of cells: {0}")]
    InvalidBoc(String),
    #[error("Exotic cells are not supported")]
    Exotic,
}

impl From<CellError> for GovernanceError {
    fn from(e: CellError) -> Self {
        match e {
            CellError::BitOverflow(_) | CellError::RefOverflow => GovernanceError::new(ErrorCode::Internal, e.to_string()),
            _ => GovernanceError::rpc(format!("Malformed contract state: {}", e)),
        }
    }
}

/// Immutable cell with its hash and depth precomputed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    data: Vec<u8>,
    bits: usize,
    refs: Vec<Arc<Cell>>,
    hash: [u8; 32],
    depth: u16,
}

impl Cell {
    fn new(data: Vec<u8>, bits: usize, refs: Vec<Arc<Cell>>) -> Self {
        let depth = refs.iter().map(|r| r.depth + 1).max().unwrap_or(0);

        let mut hasher = Sha256::new();
        hasher.update([refs.len() as u8, descriptor_bits(bits)]);
        hasher.update(padded_data(&data, bits));
        for r in &refs {
            hasher.update(r.depth.to_be_bytes());
        }
        for r in &refs {
            hasher.update(r.hash);
        }

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hasher.finalize());
        Self { data, bits, refs, hash, depth }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, Vec::new())
    }

    /// Representation hash
    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    pub fn bit_len(&self) -> usize {
        self.bits
    }

    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.refs
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0 && self.refs.is_empty()
    }

    pub fn parse(&self) -> CellSlice<'_> {
        CellSlice { cell: self, bit_pos: 0, ref_pos: 0 }
    }

    fn bit(&self, index: usize) -> bool {
        self.data[index / 8] & (0x80 >> (index % 8)) != 0
    }

    /// Decode a single-root bag of cells
    pub fn from_boc(bytes: &[u8]) -> Result<Arc<Cell>, CellError> {
        let mut r = ByteReader { bytes, pos: 0 };
        if r.take(4)? != BOC_MAGIC {
            return Err(CellError::InvalidBoc("bad magic".into()));
        }

        let flags = r.take(1)?[0];
        let has_index = flags & 0x80 != 0;
        let has_crc = flags & 0x40 != 0;
        let size = (flags & 0x07) as usize;
        let offset_bytes = r.take(1)?[0] as usize;
        if size == 0 || size > 4 || offset_bytes == 0 || offset_bytes > 8 {
            return Err(CellError::InvalidBoc("bad size fields".into()));
        }

        let cell_count = r.uint(size)? as usize;
        let root_count = r.uint(size)? as usize;
        let _absent = r.uint(size)?;
        let total_size = r.uint(offset_bytes)? as usize;
        if root_count != 1 {
            return Err(CellError::InvalidBoc(format!("expected one root, got {}", root_count)));
        }
        let root = r.uint(size)? as usize;
        if has_index {
            r.take(cell_count * offset_bytes)?;
        }

        let mut cells_data = ByteReader { bytes: r.take(total_size)?, pos: 0 };
        if has_crc {
            r.take(4)?;
        }

        let mut raw = Vec::with_capacity(cell_count.min(4096));
        for index in 0..cell_count {
            let d1 = cells_data.take(1)?[0];
            let d2 = cells_data.take(1)?[0];
            if d1 & 0x08 != 0 {
                return Err(CellError::Exotic);
            }
            let ref_count = (d1 & 0x07) as usize;
            if ref_count > MAX_REFS {
                return Err(CellError::InvalidBoc("too many references".into()));
            }

            let data_len = (d2 as usize).div_ceil(2);
            let mut data = cells_data.take(data_len)?.to_vec();
            let bits = if d2 % 2 == 1 {
                let last = data.last().copied().unwrap_or(0);
                if last == 0 {
                    return Err(CellError::InvalidBoc("missing completion tag".into()));
                }
                let trailing = last.trailing_zeros() as usize;
                if let Some(byte) = data.last_mut() {
                    *byte &= !(1u8 << trailing);
                }
                data_len * 8 - trailing - 1
            } else {
                data_len * 8
            };

            let mut refs = Vec::with_capacity(ref_count);
            for _ in 0..ref_count {
                let child = cells_data.uint(size)? as usize;
                if child <= index || child >= cell_count {
                    return Err(CellError::InvalidBoc("references must point forward".into()));
                }
                refs.push(child);
            }
            raw.push((data, bits, refs));
        }

        let mut built: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
        for index in (0..cell_count).rev() {
            let (data, bits, ref_indices) = std::mem::take(&mut raw[index]);
            let refs = ref_indices
                .iter()
                .map(|i| built[*i].clone().ok_or_else(|| CellError::InvalidBoc("dangling reference".into())))
                .collect::<Result<Vec<_>, _>>()?;
            built[index] = Some(Arc::new(Cell::new(data, bits, refs)));
        }

        built
            .get(root)
            .cloned()
            .flatten()
            .ok_or_else(|| CellError::InvalidBoc("root index out of range".into()))
    }

    /// Encode as a bag of cells without index or checksum
    pub fn to_boc(self: &Arc<Self>) -> Vec<u8> {
        // reverse post-order puts every parent before its children
        let mut order: Vec<Arc<Cell>> = Vec::new();
        let mut seen: HashMap<[u8; 32], ()> = HashMap::new();
        post_order(self, &mut seen, &mut order);
        order.reverse();

        let index: HashMap<[u8; 32], usize> = order.iter().enumerate().map(|(i, c)| (c.hash, i)).collect();
        let size = bytes_for(order.len() as u64).max(1);

        let mut cells = Vec::new();
        for cell in &order {
            cells.push(cell.refs.len() as u8);
            cells.push(descriptor_bits(cell.bits));
            cells.extend_from_slice(&padded_data(&cell.data, cell.bits));
            for r in &cell.refs {
                push_uint(&mut cells, index[&r.hash] as u64, size);
            }
        }
        let offset_bytes = bytes_for(cells.len() as u64).max(1);

        let mut out = BOC_MAGIC.to_vec();
        out.push(size as u8);
        out.push(offset_bytes as u8);
        push_uint(&mut out, order.len() as u64, size);
        push_uint(&mut out, 1, size);
        push_uint(&mut out, 0, size);
        push_uint(&mut out, cells.len() as u64, offset_bytes);
        push_uint(&mut out, 0, size);
        out.extend_from_slice(&cells);
        out
    }
}

fn post_order(cell: &Arc<Cell>, seen: &mut HashMap<[u8; 32], ()>, out: &mut Vec<Arc<Cell>>) {
    if seen.insert(cell.hash, ()).is_some() {
        return;
    }
    for r in &cell.refs {
        post_order(r, seen, out);
    }
    out.push(cell.clone());
}

fn descriptor_bits(bits: usize) -> u8 {
    ((bits / 8) + bits.div_ceil(8)) as u8
}

/// Data bytes with the completion tag appended to a partial last byte
fn padded_data(data: &[u8], bits: usize) -> Vec<u8> {
    let mut out = data[..bits.div_ceil(8)].to_vec();
    if bits % 8 != 0 {
        let last = out.len() - 1;
        out[last] |= 0x80 >> (bits % 8);
    }
    out
}

fn bytes_for(value: u64) -> usize {
    (64 - value.leading_zeros() as usize).div_ceil(8)
}

fn push_uint(out: &mut Vec<u8>, value: u64, width: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], CellError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| CellError::InvalidBoc("unexpected end of data".into()))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn uint(&mut self, width: usize) -> Result<u64, CellError> {
        Ok(self.take(width)?.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }
}

/// Accumulates bits and references for a new cell
#[derive(Debug, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bits: usize,
    refs: Vec<Arc<Cell>>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.bits
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self, CellError> {
        if self.bits >= MAX_BITS {
            return Err(CellError::BitOverflow(1));
        }
        if self.bits % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let last = self.data.len() - 1;
            self.data[last] |= 0x80 >> (self.bits % 8);
        }
        self.bits += 1;
        Ok(self)
    }

    /// Store the low `bits` bits of `value`, most significant first
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self, CellError> {
        if bits > 64 || (bits < 64 && value >> bits != 0) {
            return Err(CellError::BitOverflow(bits));
        }
        if self.bits + bits > MAX_BITS {
            return Err(CellError::BitOverflow(bits));
        }
        for i in (0..bits).rev() {
            self.store_bit((value >> i) & 1 == 1)?;
        }
        Ok(self)
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, CellError> {
        if self.bits + bytes.len() * 8 > MAX_BITS {
            return Err(CellError::BitOverflow(bytes.len() * 8));
        }
        for byte in bytes {
            self.store_uint(u64::from(*byte), 8)?;
        }
        Ok(self)
    }

    pub fn store_ref(&mut self, cell: Arc<Cell>) -> Result<&mut Self, CellError> {
        if self.refs.len() >= MAX_REFS {
            return Err(CellError::RefOverflow);
        }
        self.refs.push(cell);
        Ok(self)
    }

    pub fn build(&mut self) -> Cell {
        Cell::new(std::mem::take(&mut self.data), std::mem::replace(&mut self.bits, 0), std::mem::take(&mut self.refs))
    }
}

/// Sequential reader over a cell
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_pos: usize,
    ref_pos: usize,
}

impl<'a> CellSlice<'a> {
    pub fn remaining_bits(&self) -> usize {
        self.cell.bits - self.bit_pos
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.refs.len() - self.ref_pos
    }

    pub fn load_bit(&mut self) -> Result<bool, CellError> {
        if self.bit_pos >= self.cell.bits {
            return Err(CellError::Underflow("not enough bits"));
        }
        let bit = self.cell.bit(self.bit_pos);
        self.bit_pos += 1;
        Ok(bit)
    }

    pub fn load_uint(&mut self, bits: usize) -> Result<u64, CellError> {
        if bits > 64 {
            return Err(CellError::Underflow("integer wider than 64 bits"));
        }
        if bits > self.remaining_bits() {
            return Err(CellError::Underflow("not enough bits"));
        }
        let mut value = 0u64;
        for _ in 0..bits {
            value = (value << 1) | u64::from(self.load_bit()?);
        }
        Ok(value)
    }

    pub fn load_bytes(&mut self, len: usize) -> Result<Vec<u8>, CellError> {
        if len * 8 > self.remaining_bits() {
            return Err(CellError::Underflow("not enough bits"));
        }
        (0..len).map(|_| self.load_uint(8).map(|b| b as u8)).collect()
    }

    pub fn load_u256(&mut self) -> Result<[u8; 32], CellError> {
        let bytes = self.load_bytes(32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    pub fn load_ref(&mut self) -> Result<Arc<Cell>, CellError> {
        let cell = self
            .cell
            .refs
            .get(self.ref_pos)
            .cloned()
            .ok_or(CellError::Underflow("not enough references"))?;
        self.ref_pos += 1;
        Ok(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cell_hash() {
        assert_eq!(
            hex::encode(Cell::empty().hash()),
            "96a296d224f285c67bee93c30f8a309157f0daa35dc5b87e410b78630a09cfc7"
        );
    }

    #[test]
    fn test_partial_byte_padding() {
        let mut b = CellBuilder::new();
        b.store_uint(0b101, 3).unwrap();
        let cell = b.build();
        assert_eq!(cell.bit_len(), 3);
        assert_eq!(padded_data(&cell.data, cell.bits), vec![0b1011_0000]);
        assert_eq!(descriptor_bits(3), 1);
        assert_eq!(descriptor_bits(8), 2);
    }

    #[test]
    fn test_builder_limits() {
        let mut b = CellBuilder::new();
        for _ in 0..4 {
            b.store_ref(Arc::new(Cell::empty())).unwrap();
        }
        assert_eq!(b.store_ref(Arc::new(Cell::empty())).unwrap_err(), CellError::RefOverflow);

        let mut b = CellBuilder::new();
        b.store_bytes(&[0u8; 127]).unwrap();
        b.store_uint(0, 7).unwrap();
        assert!(b.store_bit(true).is_err());
        assert!(CellBuilder::new().store_uint(4, 2).is_err());
    }

    #[test]
    fn test_slice_reads_back() {
        let child = Arc::new(Cell::empty());
        let mut b = CellBuilder::new();
        b.store_uint(0x2a, 7).unwrap().store_bytes(&[0xde, 0xad]).unwrap().store_ref(child.clone()).unwrap();
        let cell = b.build();

        let mut s = cell.parse();
        assert_eq!(s.load_uint(7).unwrap(), 0x2a);
        assert_eq!(s.load_bytes(2).unwrap(), vec![0xde, 0xad]);
        assert_eq!(s.load_ref().unwrap(), child);
        assert_eq!(s.remaining_bits(), 0);
        assert!(s.load_bit().is_err());
        assert!(s.load_ref().is_err());
    }

    #[test]
    fn test_depth_and_hash_follow_children() {
        let leaf = Arc::new(Cell::empty());
        let mut b = CellBuilder::new();
        b.store_ref(leaf.clone()).unwrap();
        let parent = b.build();
        assert_eq!(parent.depth(), 1);
        assert_ne!(parent.hash(), leaf.hash());
    }

    #[test]
    fn test_boc_round_trip_with_shared_child() {
        let shared = {
            let mut b = CellBuilder::new();
            b.store_uint(7, 5).unwrap();
            Arc::new(b.build())
        };
        let middle = {
            let mut b = CellBuilder::new();
            b.store_bytes(b"mid").unwrap().store_ref(shared.clone()).unwrap();
            Arc::new(b.build())
        };
        let root = {
            let mut b = CellBuilder::new();
            b.store_uint(1, 1).unwrap().store_ref(middle).unwrap().store_ref(shared).unwrap();
            Arc::new(b.build())
        };

        let decoded = Cell::from_boc(&root.to_boc()).unwrap();
        assert_eq!(decoded.hash(), root.hash());
        assert_eq!(decoded.refs().len(), 2);
    }

    #[test]
    fn test_boc_rejects_garbage() {
        assert!(Cell::from_boc(&[0u8; 8]).is_err());
        let mut boc = Arc::new(Cell::empty()).to_boc();
        boc.truncate(boc.len() - 1);
        assert!(Cell::from_boc(&boc).is_err());
    }
}
