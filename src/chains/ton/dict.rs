//! `HashmapE 256 ^Cell` dictionaries
//!
//! Serialization picks the shortest of the three label encodings for every
//! edge, so two dictionaries with equal entries always hash equally no
//! matter the insertion order.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::cell::{Cell, CellBuilder, CellError, CellSlice};

pub const KEY_BITS: usize = 256;

type Key = [u8; 32];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dict256 {
    entries: BTreeMap<Key, Arc<Cell>>,
}

impl Dict256 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Key, value: Arc<Cell>) -> Option<Arc<Cell>> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: &Key) -> Option<Arc<Cell>> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in ascending order, which is also left-first tree order
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Root edge cell; an empty dictionary is the empty cell
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        if self.entries.is_empty() {
            return Ok(Cell::empty());
        }
        let entries: Vec<(&Key, &Arc<Cell>)> = self.entries.iter().collect();
        build_edge(&entries, 0, KEY_BITS)
    }

    pub fn from_cell(cell: &Cell) -> Result<Self, CellError> {
        let mut dict = Self::new();
        if cell.is_empty() {
            return Ok(dict);
        }
        let mut prefix = Vec::with_capacity(KEY_BITS);
        read_edge(cell.parse(), &mut prefix, KEY_BITS, &mut dict)?;
        Ok(dict)
    }
}

fn key_bit(key: &Key, index: usize) -> bool {
    key[index / 8] & (0x80 >> (index % 8)) != 0
}

/// Bits needed to store a label length in `0..=max`
fn len_bits(max: usize) -> usize {
    (usize::BITS - max.leading_zeros()) as usize
}

fn build_edge(entries: &[(&Key, &Arc<Cell>)], offset: usize, remaining: usize) -> Result<Cell, CellError> {
    let first = entries[0].0;
    let last = entries[entries.len() - 1].0;

    let label_len = if entries.len() == 1 {
        remaining
    } else {
        (0..remaining)
            .take_while(|i| key_bit(first, offset + i) == key_bit(last, offset + i))
            .count()
    };

    let mut builder = CellBuilder::new();
    store_label(&mut builder, first, offset, label_len, remaining)?;

    if label_len == remaining {
        builder.store_ref(entries[0].1.clone())?;
        return Ok(builder.build());
    }

    let fork_bit = offset + label_len;
    let split = entries.partition_point(|(key, _)| !key_bit(key, fork_bit));
    let child_remaining = remaining - label_len - 1;
    let left = build_edge(&entries[..split], fork_bit + 1, child_remaining)?;
    let right = build_edge(&entries[split..], fork_bit + 1, child_remaining)?;
    builder.store_ref(Arc::new(left))?.store_ref(Arc::new(right))?;
    Ok(builder.build())
}

fn store_label(builder: &mut CellBuilder, key: &Key, offset: usize, len: usize, max: usize) -> Result<(), CellError> {
    let bits: Vec<bool> = (offset..offset + len).map(|i| key_bit(key, i)).collect();
    let width = len_bits(max);

    let short_cost = 2 + 2 * len;
    let long_cost = 2 + width + len;
    let same_cost = 3 + width;
    let uniform = bits.windows(2).all(|w| w[0] == w[1]);

    if uniform && len > 0 && same_cost < short_cost.min(long_cost) {
        builder.store_bit(true)?.store_bit(true)?.store_bit(bits[0])?;
        builder.store_uint(len as u64, width)?;
    } else if long_cost < short_cost {
        builder.store_bit(true)?.store_bit(false)?;
        builder.store_uint(len as u64, width)?;
        for bit in bits {
            builder.store_bit(bit)?;
        }
    } else {
        builder.store_bit(false)?;
        for _ in 0..len {
            builder.store_bit(true)?;
        }
        builder.store_bit(false)?;
        for bit in bits {
            builder.store_bit(bit)?;
        }
    }
    Ok(())
}

fn load_label(slice: &mut CellSlice<'_>, max: usize, prefix: &mut Vec<bool>) -> Result<usize, CellError> {
    let width = len_bits(max);
    let len = if !slice.load_bit()? {
        let mut len = 0;
        while slice.load_bit()? {
            len += 1;
        }
        for _ in 0..len {
            prefix.push(slice.load_bit()?);
        }
        len
    } else if !slice.load_bit()? {
        let len = slice.load_uint(width)? as usize;
        for _ in 0..len {
            prefix.push(slice.load_bit()?);
        }
        len
    } else {
        let bit = slice.load_bit()?;
        let len = slice.load_uint(width)? as usize;
        prefix.extend(std::iter::repeat(bit).take(len));
        len
    };

    if len > max {
        return Err(CellError::Underflow("dictionary label longer than key"));
    }
    Ok(len)
}

fn read_edge(mut slice: CellSlice<'_>, prefix: &mut Vec<bool>, remaining: usize, out: &mut Dict256) -> Result<(), CellError> {
    let start = prefix.len();
    let len = load_label(&mut slice, remaining, prefix)?;

    if len == remaining {
        let mut key = [0u8; 32];
        for (i, bit) in prefix.iter().enumerate() {
            if *bit {
                key[i / 8] |= 0x80 >> (i % 8);
            }
        }
        out.insert(key, slice.load_ref()?);
    } else {
        let left = slice.load_ref()?;
        let right = slice.load_ref()?;
        for (child, bit) in [(left, false), (right, true)] {
            let fork = prefix.len();
            prefix.push(bit);
            read_edge(child.parse(), prefix, remaining - len - 1, out)?;
            prefix.truncate(fork);
        }
    }

    prefix.truncate(start);
    Ok(())
}
