// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TON cells: the bit-string plus references tree every on-chain structure
//! (messages, state inits, get-method arguments) is built from.
//!
//! Only ordinary cells can be built. Exotic cells are accepted when parsing
//! a bag of cells (network responses may contain pruned branches) but are
//! treated as opaque.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::address::Address;
use super::boc;

/// Maximum number of data bits in a single cell.
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references in a single cell.
pub const MAX_CELL_REFS: usize = 4;

/// Maximum depth of a cell tree.
pub const MAX_CELL_DEPTH: u16 = 1024;

/// Errors raised while building or reading cells.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CellError {
    #[error("cell overflow: {bits} bits exceed the 1023 bit limit")]
    BitOverflow { bits: usize },

    #[error("cell overflow: more than 4 references")]
    RefOverflow,

    #[error("cell tree deeper than 1024 levels")]
    DepthOverflow,

    #[error("cell underflow: requested {requested} bits, {remaining} remaining")]
    BitUnderflow { requested: usize, remaining: usize },

    #[error("cell underflow: no reference left")]
    RefUnderflow,

    #[error("value does not fit in {bits} bits")]
    ValueTooLarge { bits: usize },

    #[error("invalid cell data: {0}")]
    InvalidData(String),
}

/// An immutable cell.
#[derive(Clone)]
pub struct Cell {
    /// `ceil(bit_len / 8)` bytes; bits past `bit_len` are always zero.
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
    exotic: bool,
    level_mask: u8,
    hash: OnceLock<[u8; 32]>,
    depth: OnceLock<u16>,
}

impl Cell {
    /// The empty ordinary cell.
    pub fn empty() -> Self {
        CellBuilder::new().build()
    }

    pub(crate) fn from_parts(
        mut data: Vec<u8>,
        bit_len: usize,
        refs: Vec<Arc<Cell>>,
        exotic: bool,
        level_mask: u8,
    ) -> Result<Self, CellError> {
        if bit_len > MAX_CELL_BITS {
            return Err(CellError::BitOverflow { bits: bit_len });
        }
        if refs.len() > MAX_CELL_REFS {
            return Err(CellError::RefOverflow);
        }
        if refs.iter().any(|r| r.depth() >= MAX_CELL_DEPTH) {
            return Err(CellError::DepthOverflow);
        }
        let byte_len = bit_len.div_ceil(8);
        if data.len() < byte_len {
            return Err(CellError::InvalidData(format!(
                "{} bytes cannot hold {} bits",
                data.len(),
                bit_len
            )));
        }
        data.truncate(byte_len);
        let rem = bit_len % 8;
        if rem != 0 {
            let last = byte_len - 1;
            data[last] &= 0xffu8 << (8 - rem);
        }
        Ok(Self {
            data,
            bit_len,
            refs,
            exotic,
            level_mask,
            hash: OnceLock::new(),
            depth: OnceLock::new(),
        })
    }

    /// Number of data bits.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Raw data bytes (last byte zero-padded).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.refs
    }

    pub fn is_exotic(&self) -> bool {
        self.exotic
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0 && self.refs.is_empty()
    }

    /// Start reading this cell from the beginning.
    pub fn parse(&self) -> CellSlice<'_> {
        CellSlice::new(self)
    }

    /// Refs descriptor byte.
    pub(crate) fn d1(&self) -> u8 {
        self.refs.len() as u8 + if self.exotic { 8 } else { 0 } + 32 * self.level_mask
    }

    /// Bits descriptor byte.
    pub(crate) fn d2(&self) -> u8 {
        ((self.bit_len / 8) + self.bit_len.div_ceil(8)) as u8
    }

    /// Data bytes with the completion tag appended when not byte-aligned.
    pub(crate) fn augmented_data(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        let rem = self.bit_len % 8;
        if rem != 0 {
            if let Some(last) = out.last_mut() {
                *last |= 0x80 >> rem;
            }
        }
        out
    }

    /// Depth of the tree below this cell (0 for a leaf). Children are
    /// checked on construction, so the recursion is bounded.
    pub fn depth(&self) -> u16 {
        *self.depth.get_or_init(|| {
            self.refs
                .iter()
                .map(|r| r.depth() + 1)
                .max()
                .unwrap_or(0)
        })
    }

    /// Representation hash.
    pub fn hash(&self) -> [u8; 32] {
        *self.hash.get_or_init(|| {
            let mut hasher = Sha256::new();
            hasher.update([self.d1(), self.d2()]);
            hasher.update(self.augmented_data());
            for r in &self.refs {
                hasher.update(r.depth().to_be_bytes());
            }
            for r in &self.refs {
                hasher.update(r.hash());
            }
            hasher.finalize().into()
        })
    }

    /// Representation hash as lowercase hex.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    /// Serialize as a standard-base64 bag of cells.
    pub fn to_boc_base64(&self) -> String {
        boc::to_base64(self)
    }

    /// Parse a single-root bag of cells from standard or URL-safe base64.
    pub fn from_boc_base64(src: &str) -> Result<Self, boc::BocError> {
        boc::from_base64(src)
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for Cell {}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("bits", &self.bit_len)
            .field("data", &hex::encode(&self.data))
            .field("refs", &self.refs)
            .finish()
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_boc_base64())
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Cell::from_boc_base64(&raw).map_err(serde::de::Error::custom)
    }
}

/// Number of bytes needed to represent `value` (0 for zero).
fn byte_len(value: u128) -> usize {
    ((128 - value.leading_zeros()) as usize).div_ceil(8)
}

// =============================================================================
// Builder
// =============================================================================

/// Incremental cell builder. Limits are enforced on every store so
/// [`CellBuilder::build`] cannot fail.
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    pub fn available_bits(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    pub fn available_refs(&self) -> usize {
        MAX_CELL_REFS - self.refs.len()
    }

    fn ensure_bits(&self, bits: usize) -> Result<(), CellError> {
        if self.bit_len + bits > MAX_CELL_BITS {
            return Err(CellError::BitOverflow {
                bits: self.bit_len + bits,
            });
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            self.data[self.bit_len / 8] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self, CellError> {
        self.ensure_bits(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    /// Store an unsigned integer in `bits` bits (at most 128).
    pub fn store_uint(&mut self, value: u128, bits: usize) -> Result<&mut Self, CellError> {
        if bits > 128 || (bits < 128 && value >> bits != 0) {
            return Err(CellError::ValueTooLarge { bits });
        }
        self.ensure_bits(bits)?;
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(self)
    }

    /// Store a two's complement signed integer in `bits` bits. Widths above
    /// 128 are sign-extended (used for TVM `int257`).
    pub fn store_int(&mut self, value: i128, bits: usize) -> Result<&mut Self, CellError> {
        if bits == 0 {
            return if value == 0 {
                Ok(self)
            } else {
                Err(CellError::ValueTooLarge { bits })
            };
        }
        if bits < 128 {
            let min = -(1i128 << (bits - 1));
            let max = (1i128 << (bits - 1)) - 1;
            if value < min || value > max {
                return Err(CellError::ValueTooLarge { bits });
            }
        }
        self.ensure_bits(bits)?;
        let negative = value < 0;
        for _ in 128..bits {
            self.push_bit(negative);
        }
        let raw = value as u128;
        for i in (0..bits.min(128)).rev() {
            self.push_bit((raw >> i) & 1 == 1);
        }
        Ok(self)
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, CellError> {
        self.ensure_bits(bytes.len() * 8)?;
        if self.bit_len % 8 == 0 {
            self.data.extend_from_slice(bytes);
            self.bit_len += bytes.len() * 8;
        } else {
            for byte in bytes {
                for i in (0..8).rev() {
                    self.push_bit((byte >> i) & 1 == 1);
                }
            }
        }
        Ok(self)
    }

    /// Store the first `bit_len` bits of `data`.
    pub fn store_bits(&mut self, data: &[u8], bit_len: usize) -> Result<&mut Self, CellError> {
        if data.len() * 8 < bit_len {
            return Err(CellError::InvalidData(format!(
                "{} bytes cannot hold {} bits",
                data.len(),
                bit_len
            )));
        }
        self.ensure_bits(bit_len)?;
        for pos in 0..bit_len {
            self.push_bit(data[pos / 8] & (0x80 >> (pos % 8)) != 0);
        }
        Ok(self)
    }

    /// Store `VarUInteger 16` (the `Coins` type).
    pub fn store_coins(&mut self, amount: u128) -> Result<&mut Self, CellError> {
        let len = byte_len(amount);
        if len > 15 {
            return Err(CellError::ValueTooLarge { bits: 120 });
        }
        self.store_uint(len as u128, 4)?;
        self.store_uint(amount, len * 8)
    }

    /// Store a `MsgAddress`: `addr_none` for `None`, `addr_std` otherwise.
    pub fn store_address(&mut self, address: Option<&Address>) -> Result<&mut Self, CellError> {
        match address {
            None => self.store_uint(0, 2),
            Some(address) => {
                self.ensure_bits(267)?;
                self.store_uint(0b100, 3)?;
                self.store_int(address.workchain as i128, 8)?;
                self.store_bytes(&address.hash)
            }
        }
    }

    pub fn store_ref(&mut self, cell: impl Into<Arc<Cell>>) -> Result<&mut Self, CellError> {
        if self.refs.len() >= MAX_CELL_REFS {
            return Err(CellError::RefOverflow);
        }
        let cell = cell.into();
        if cell.depth() >= MAX_CELL_DEPTH {
            return Err(CellError::DepthOverflow);
        }
        self.refs.push(cell);
        Ok(self)
    }

    /// `Maybe ^Cell`.
    pub fn store_maybe_ref(&mut self, cell: Option<Arc<Cell>>) -> Result<&mut Self, CellError> {
        match cell {
            Some(cell) => {
                self.store_bit(true)?;
                self.store_ref(cell)
            }
            None => self.store_bit(false),
        }
    }

    /// Append all bits and references of `cell` to this builder.
    pub fn store_cell_contents(&mut self, cell: &Cell) -> Result<&mut Self, CellError> {
        if self.refs.len() + cell.refs.len() > MAX_CELL_REFS {
            return Err(CellError::RefOverflow);
        }
        self.store_bits(&cell.data, cell.bit_len)?;
        self.refs.extend(cell.refs.iter().cloned());
        Ok(self)
    }

    /// Store bytes as a snake: fill this cell, continue in a chain of refs.
    pub fn store_snake_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, CellError> {
        let capacity = self.available_bits() / 8;
        if bytes.len() <= capacity {
            return self.store_bytes(bytes);
        }
        let (head, tail) = bytes.split_at(capacity);

        // Built from the last link backwards.
        let mut chain: Option<Cell> = None;
        for part in tail.chunks(MAX_CELL_BITS / 8).rev() {
            let mut link = CellBuilder::new();
            link.store_bytes(part)?;
            if let Some(next) = chain.take() {
                link.store_ref(next)?;
            }
            chain = Some(link.build());
        }
        self.store_bytes(head)?;
        match chain {
            Some(next) => self.store_ref(next),
            None => Ok(self),
        }
    }

    pub fn build(self) -> Cell {
        Cell {
            data: self.data,
            bit_len: self.bit_len,
            refs: self.refs,
            exotic: false,
            level_mask: 0,
            hash: OnceLock::new(),
            depth: OnceLock::new(),
        }
    }
}

// =============================================================================
// Slice
// =============================================================================

/// Read cursor over a cell.
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_pos: usize,
    ref_pos: usize,
}

impl<'a> CellSlice<'a> {
    pub fn new(cell: &'a Cell) -> Self {
        Self {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len - self.bit_pos
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.refs.len() - self.ref_pos
    }

    fn ensure_bits(&self, bits: usize) -> Result<(), CellError> {
        if bits > self.remaining_bits() {
            return Err(CellError::BitUnderflow {
                requested: bits,
                remaining: self.remaining_bits(),
            });
        }
        Ok(())
    }

    fn bit_at(&self, pos: usize) -> bool {
        self.cell.data[pos / 8] & (0x80 >> (pos % 8)) != 0
    }

    pub fn load_bit(&mut self) -> Result<bool, CellError> {
        self.ensure_bits(1)?;
        let bit = self.bit_at(self.bit_pos);
        self.bit_pos += 1;
        Ok(bit)
    }

    /// Load an unsigned integer of `bits` bits (at most 128).
    pub fn load_uint(&mut self, bits: usize) -> Result<u128, CellError> {
        if bits > 128 {
            return Err(CellError::ValueTooLarge { bits });
        }
        self.ensure_bits(bits)?;
        let mut value = 0u128;
        for _ in 0..bits {
            value = (value << 1) | u128::from(self.bit_at(self.bit_pos));
            self.bit_pos += 1;
        }
        Ok(value)
    }

    pub fn load_u8(&mut self) -> Result<u8, CellError> {
        Ok(self.load_uint(8)? as u8)
    }

    pub fn load_u16(&mut self) -> Result<u16, CellError> {
        Ok(self.load_uint(16)? as u16)
    }

    pub fn load_u32(&mut self) -> Result<u32, CellError> {
        Ok(self.load_uint(32)? as u32)
    }

    pub fn load_u64(&mut self) -> Result<u64, CellError> {
        Ok(self.load_uint(64)? as u64)
    }

    /// Load a two's complement signed integer of `bits` bits (1..=128).
    pub fn load_int(&mut self, bits: usize) -> Result<i128, CellError> {
        if bits == 0 || bits > 128 {
            return Err(CellError::ValueTooLarge { bits });
        }
        let raw = self.load_uint(bits)?;
        if bits == 128 {
            return Ok(raw as i128);
        }
        let sign = 1u128 << (bits - 1);
        Ok(if raw & sign != 0 {
            (raw as i128) - (1i128 << bits)
        } else {
            raw as i128
        })
    }

    pub fn load_bytes(&mut self, len: usize) -> Result<Vec<u8>, CellError> {
        self.ensure_bits(len * 8)?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.load_uint(8)? as u8);
        }
        Ok(out)
    }

    pub fn skip_bits(&mut self, bits: usize) -> Result<(), CellError> {
        self.ensure_bits(bits)?;
        self.bit_pos += bits;
        Ok(())
    }

    pub fn load_coins(&mut self) -> Result<u128, CellError> {
        let len = self.load_uint(4)? as usize;
        self.load_uint(len * 8)
    }

    /// Load a `MsgAddress`; only `addr_none` and `addr_std` are supported.
    pub fn load_address(&mut self) -> Result<Option<Address>, CellError> {
        match self.load_uint(2)? {
            0b00 => Ok(None),
            0b10 => {
                if self.load_bit()? {
                    return Err(CellError::InvalidData(
                        "anycast addresses are not supported".to_string(),
                    ));
                }
                let workchain = self.load_int(8)? as i8;
                let bytes = self.load_bytes(32)?;
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&bytes);
                Ok(Some(Address::new(workchain, hash)))
            }
            tag => Err(CellError::InvalidData(format!(
                "unsupported address tag {tag:02b}"
            ))),
        }
    }

    pub fn load_ref(&mut self) -> Result<&'a Arc<Cell>, CellError> {
        let cell: &'a Cell = self.cell;
        let r = cell.refs.get(self.ref_pos).ok_or(CellError::RefUnderflow)?;
        self.ref_pos += 1;
        Ok(r)
    }

    pub fn load_maybe_ref(&mut self) -> Result<Option<&'a Arc<Cell>>, CellError> {
        if self.load_bit()? {
            self.load_ref().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Copy the unread remainder into a fresh cell.
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut builder = CellBuilder::new();
        for pos in self.bit_pos..self.cell.bit_len {
            builder.store_bit(self.bit_at(pos))?;
        }
        for r in &self.cell.refs[self.ref_pos..] {
            builder.store_ref(r.clone())?;
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cell_hash_matches_network() {
        assert_eq!(
            Cell::empty().hash_hex(),
            "96a296d224f285c67bee93c30f8a309157f0daa35dc5b87e410b78630a09cfc7"
        );
    }

    #[test]
    fn uint_round_trip() {
        let mut b = CellBuilder::new();
        b.store_uint(0x0f8a7ea5, 32).unwrap().store_uint(5, 3).unwrap();
        let cell = b.build();
        assert_eq!(cell.bit_len(), 35);

        let mut s = cell.parse();
        assert_eq!(s.load_u32().unwrap(), 0x0f8a7ea5);
        assert_eq!(s.load_uint(3).unwrap(), 5);
        assert_eq!(s.remaining_bits(), 0);
    }

    #[test]
    fn uint_rejects_values_wider_than_field() {
        let mut b = CellBuilder::new();
        assert_eq!(
            b.store_uint(8, 3).unwrap_err(),
            CellError::ValueTooLarge { bits: 3 }
        );
    }

    #[test]
    fn negative_int_round_trip() {
        let mut b = CellBuilder::new();
        b.store_int(-1, 8).unwrap();
        let cell = b.build();
        assert_eq!(cell.data(), &[0xff]);
        assert_eq!(cell.parse().load_int(8).unwrap(), -1);
    }

    #[test]
    fn wide_int_is_sign_extended() {
        let mut b = CellBuilder::new();
        b.store_int(-2, 257).unwrap();
        let cell = b.build();
        assert_eq!(cell.bit_len(), 257);
        assert!(cell.data()[..31].iter().all(|b| *b == 0xff));
    }

    #[test]
    fn zero_coins_take_four_bits() {
        let mut b = CellBuilder::new();
        b.store_coins(0).unwrap();
        assert_eq!(b.bit_len(), 4);

        let mut b = CellBuilder::new();
        b.store_coins(1_500_000_000).unwrap();
        // 1.5e9 needs 4 bytes
        assert_eq!(b.bit_len(), 4 + 32);
        assert_eq!(b.build().parse().load_coins().unwrap(), 1_500_000_000);
    }

    #[test]
    fn std_address_takes_267_bits() {
        let address = Address::new(0, [7u8; 32]);
        let mut b = CellBuilder::new();
        b.store_address(Some(&address)).unwrap();
        let cell = b.build();
        assert_eq!(cell.bit_len(), 267);
        assert_eq!(cell.parse().load_address().unwrap(), Some(address));
    }

    #[test]
    fn bit_overflow_is_rejected() {
        let mut b = CellBuilder::new();
        b.store_bytes(&[0u8; 127]).unwrap();
        assert!(matches!(
            b.store_uint(0, 8),
            Err(CellError::BitOverflow { bits: 1024 })
        ));
    }

    #[test]
    fn ref_overflow_is_rejected() {
        let mut b = CellBuilder::new();
        for _ in 0..4 {
            b.store_ref(Cell::empty()).unwrap();
        }
        assert_eq!(b.store_ref(Cell::empty()).unwrap_err(), CellError::RefOverflow);
    }

    #[test]
    fn snake_bytes_spill_into_refs() {
        let text = vec![b'a'; 300];
        let mut b = CellBuilder::new();
        b.store_uint(0, 32).unwrap();
        b.store_snake_bytes(&text).unwrap();
        let root = b.build();

        assert_eq!(root.bit_len(), 32 + 123 * 8);
        let second = &root.refs()[0];
        assert_eq!(second.bit_len(), 127 * 8);
        let third = &second.refs()[0];
        assert_eq!(third.bit_len(), (300 - 123 - 127) * 8);
        assert!(third.refs().is_empty());
    }

    #[test]
    fn ref_deeper_than_limit_is_rejected() {
        let mut chain = Cell::empty();
        for _ in 0..MAX_CELL_DEPTH {
            let mut b = CellBuilder::new();
            b.store_ref(chain).unwrap();
            chain = b.build();
        }
        assert_eq!(chain.depth(), MAX_CELL_DEPTH);

        let mut b = CellBuilder::new();
        assert_eq!(b.store_ref(chain).unwrap_err(), CellError::DepthOverflow);
    }

    #[test]
    fn oversized_snake_fails_instead_of_nesting_forever() {
        let mut b = CellBuilder::new();
        assert_eq!(
            b.store_snake_bytes(&vec![b'a'; 200_000]).unwrap_err(),
            CellError::DepthOverflow
        );
    }

    #[test]
    fn unaligned_hash_uses_completion_tag() {
        let mut b = CellBuilder::new();
        b.store_bit(true).unwrap();
        let cell = b.build();
        assert_eq!(cell.d2(), 1);
        assert_eq!(cell.augmented_data(), vec![0b1100_0000]);
    }

    #[test]
    fn depth_counts_longest_chain() {
        let leaf = Cell::empty();
        let mut mid = CellBuilder::new();
        mid.store_ref(leaf.clone()).unwrap();
        let mid = mid.build();
        let mut root = CellBuilder::new();
        root.store_ref(mid).unwrap().store_ref(leaf).unwrap();
        assert_eq!(root.build().depth(), 2);
    }

    #[test]
    fn slice_remainder_becomes_cell() {
        let mut b = CellBuilder::new();
        b.store_uint(0xab, 8).unwrap().store_uint(0xcd, 8).unwrap();
        let cell = b.build();
        let mut s = cell.parse();
        s.skip_bits(8).unwrap();
        let rest = s.to_cell().unwrap();
        assert_eq!(rest.data(), &[0xcd]);
    }
}
