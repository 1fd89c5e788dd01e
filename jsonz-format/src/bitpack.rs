//! Bit packing for boolean arrays

use bitvec::prelude::*;

/// Number of bytes needed to pack `count` booleans
pub fn packed_len(count: usize) -> usize {
    count.div_ceil(8)
}

/// Pack booleans eight per byte, least significant bit first, zero padded
pub fn pack_bools(values: &[bool]) -> Vec<u8> {
    let mut bits: BitVec<u8, Lsb0> = BitVec::with_capacity(values.len());
    bits.extend(values.iter().copied());
    bits.into_vec()
}

/// Unpacked view over a packed boolean run
#[derive(Debug, Clone)]
pub struct PackedBools<'a> {
    bits: &'a BitSlice<u8, Lsb0>,
    count: usize,
}

impl<'a> PackedBools<'a> {
    /// Wrap `bytes` holding at least `count` packed booleans
    pub fn new(bytes: &'a [u8], count: usize) -> Option<Self> {
        if bytes.len() < packed_len(count) {
            return None;
        }
        Some(Self {
            bits: bytes.view_bits::<Lsb0>(),
            count,
        })
    }

    /// Number of booleans
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Boolean at `idx`
    pub fn get(&self, idx: usize) -> Option<bool> {
        if idx >= self.count {
            return None;
        }
        self.bits.get(idx).map(|bit| *bit)
    }

    /// All booleans in order
    pub fn to_vec(&self) -> Vec<bool> {
        self.bits[..self.count].iter().map(|bit| *bit).collect()
    }
}
