// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bag-of-cells serialization.
//!
//! Writes the generic `b5ee9c72` format without index or checksum; reads
//! the generic format with optional index, cache bits and CRC32C trailer
//! (the checksum is not verified).

use std::collections::HashMap;
use std::sync::Arc;

use base64ct::{Base64, Base64Url, Encoding};

use super::cell::{Cell, CellError};

/// Smallest serialized cell: the two descriptor bytes.
const MIN_CELL_BYTES: usize = 2;

const BOC_GENERIC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BocError {
    #[error("invalid base64: {0}")]
    Base64(String),

    #[error("unsupported bag-of-cells magic {0:02x?}")]
    UnsupportedMagic([u8; 4]),

    #[error("bag of cells is truncated")]
    Truncated,

    #[error("expected exactly one root, found {0}")]
    RootCount(usize),

    #[error("malformed bag of cells: {0}")]
    Malformed(String),

    #[error(transparent)]
    Cell(#[from] CellError),
}

/// Minimum number of bytes needed to store `value`.
fn bytes_for(value: usize) -> usize {
    let bits = usize::BITS - value.leading_zeros();
    (bits as usize).div_ceil(8).max(1)
}

fn write_be(out: &mut Vec<u8>, value: usize, width: usize) {
    for i in (0..width).rev() {
        out.push((value >> (i * 8)) as u8);
    }
}

/// Collect unique cells so that every parent precedes its children.
fn topological_order(root: &Cell) -> Vec<&Cell> {
    fn visit<'c>(
        cell: &'c Cell,
        seen: &mut HashMap<[u8; 32], ()>,
        post_order: &mut Vec<&'c Cell>,
    ) {
        if seen.insert(cell.hash(), ()).is_some() {
            return;
        }
        for child in cell.refs() {
            visit(child, seen, post_order);
        }
        post_order.push(cell);
    }

    let mut seen = HashMap::new();
    let mut post_order = Vec::new();
    visit(root, &mut seen, &mut post_order);
    post_order.reverse();
    post_order
}

/// Serialize a single-root bag of cells.
pub fn serialize(root: &Cell) -> Vec<u8> {
    let cells = topological_order(root);
    let index: HashMap<[u8; 32], usize> = cells
        .iter()
        .enumerate()
        .map(|(i, c)| (c.hash(), i))
        .collect();

    let size_bytes = bytes_for(cells.len());
    let mut payload = Vec::new();
    for cell in &cells {
        payload.push(cell.d1());
        payload.push(cell.d2());
        payload.extend(cell.augmented_data());
        for child in cell.refs() {
            write_be(&mut payload, index[&child.hash()], size_bytes);
        }
    }
    let off_bytes = bytes_for(payload.len());

    let mut out = Vec::with_capacity(payload.len() + 16);
    out.extend_from_slice(&BOC_GENERIC_MAGIC);
    // has_idx = 0, has_crc32c = 0, has_cache_bits = 0, flags = 0
    out.push(size_bytes as u8);
    out.push(off_bytes as u8);
    write_be(&mut out, cells.len(), size_bytes);
    write_be(&mut out, 1, size_bytes);
    write_be(&mut out, 0, size_bytes);
    write_be(&mut out, payload.len(), off_bytes);
    write_be(&mut out, 0, size_bytes);
    out.extend(payload);
    out
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], BocError> {
        let end = self.pos.checked_add(len).ok_or(BocError::Truncated)?;
        let out = self.data.get(self.pos..end).ok_or(BocError::Truncated)?;
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, BocError> {
        Ok(self.take(1)?[0])
    }

    fn uint(&mut self, width: usize) -> Result<usize, BocError> {
        if width > std::mem::size_of::<usize>() {
            return Err(BocError::Malformed(format!("field width {width} too large")));
        }
        Ok(self
            .take(width)?
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize))
    }
}

struct RawCell<'a> {
    data: &'a [u8],
    bit_len: usize,
    refs: Vec<usize>,
    exotic: bool,
    level_mask: u8,
}

/// Deserialize a bag of cells, returning all roots.
pub fn deserialize(data: &[u8]) -> Result<Vec<Cell>, BocError> {
    let mut r = Reader { data, pos: 0 };
    let magic: [u8; 4] = r
        .take(4)?
        .try_into()
        .map_err(|_| BocError::Truncated)?;
    if magic != BOC_GENERIC_MAGIC {
        return Err(BocError::UnsupportedMagic(magic));
    }

    let flags = r.u8()?;
    let has_idx = flags & 0x80 != 0;
    let has_crc = flags & 0x40 != 0;
    let size_bytes = (flags & 0x07) as usize;
    if size_bytes == 0 {
        return Err(BocError::Malformed("zero reference size".to_string()));
    }
    let off_bytes = r.u8()? as usize;

    let cell_count = r.uint(size_bytes)?;
    let root_count = r.uint(size_bytes)?;
    let _absent = r.uint(size_bytes)?;
    let total_size = r.uint(off_bytes)?;

    // Counts come from the input; bound them by its length before allocating.
    if cell_count > r.remaining() / MIN_CELL_BYTES {
        return Err(BocError::Malformed(format!(
            "{cell_count} cells cannot fit in {} bytes",
            r.remaining()
        )));
    }
    if root_count > cell_count || root_count > r.remaining() / size_bytes {
        return Err(BocError::Malformed(format!(
            "{root_count} roots for {cell_count} cells"
        )));
    }

    let mut roots = Vec::with_capacity(root_count);
    for _ in 0..root_count {
        roots.push(r.uint(size_bytes)?);
    }
    if has_idx {
        let index_len = cell_count
            .checked_mul(off_bytes)
            .ok_or_else(|| BocError::Malformed("index size overflows".to_string()))?;
        r.take(index_len)?;
    }

    let cells_data = r.take(total_size)?;
    if has_crc {
        r.take(4)?;
    }
    if cell_count > cells_data.len() / MIN_CELL_BYTES {
        return Err(BocError::Malformed(format!(
            "{cell_count} cells cannot fit in {} bytes",
            cells_data.len()
        )));
    }

    let mut cr = Reader {
        data: cells_data,
        pos: 0,
    };
    let mut raw = Vec::with_capacity(cell_count);
    for _ in 0..cell_count {
        let d1 = cr.u8()?;
        let d2 = cr.u8()?;
        let ref_count = (d1 & 0x07) as usize;
        let exotic = d1 & 0x08 != 0;
        let level_mask = d1 >> 5;
        let byte_len = (d2 as usize).div_ceil(2);
        let bytes = cr.take(byte_len)?;

        let bit_len = if d2 % 2 == 0 {
            byte_len * 8
        } else {
            let last = *bytes
                .last()
                .ok_or_else(|| BocError::Malformed("empty unaligned cell".to_string()))?;
            if last == 0 {
                return Err(BocError::Malformed("missing completion tag".to_string()));
            }
            byte_len * 8 - (last.trailing_zeros() as usize + 1)
        };

        let mut refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            refs.push(cr.uint(size_bytes)?);
        }
        raw.push(RawCell {
            data: bytes,
            bit_len,
            refs,
            exotic,
            level_mask,
        });
    }

    // Children always follow their parents, so build from the back.
    let mut built: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
    for (i, cell) in raw.iter().enumerate().rev() {
        let mut refs = Vec::with_capacity(cell.refs.len());
        for &child in &cell.refs {
            if child <= i {
                return Err(BocError::Malformed(format!(
                    "cell {i} references earlier cell {child}"
                )));
            }
            let built_child = built
                .get(child)
                .and_then(|c| c.clone())
                .ok_or_else(|| BocError::Malformed(format!("dangling reference {child}")))?;
            refs.push(built_child);
        }
        let cell = Cell::from_parts(
            cell.data.to_vec(),
            cell.bit_len,
            refs,
            cell.exotic,
            cell.level_mask,
        )
        .map_err(|e| match e {
            CellError::DepthOverflow => BocError::Malformed(format!("cell {i}: {e}")),
            e => BocError::Cell(e),
        })?;
        // Hash bottom-up so no later call recurses through the whole tree.
        cell.hash();
        built[i] = Some(Arc::new(cell));
    }

    roots
        .into_iter()
        .map(|idx| {
            built
                .get(idx)
                .and_then(|c| c.as_deref().cloned())
                .ok_or_else(|| BocError::Malformed(format!("root index {idx} out of range")))
        })
        .collect()
}

/// Deserialize a bag of cells that must contain exactly one root.
pub fn deserialize_single(data: &[u8]) -> Result<Cell, BocError> {
    let mut roots = deserialize(data)?;
    if roots.len() != 1 {
        return Err(BocError::RootCount(roots.len()));
    }
    Ok(roots.remove(0))
}

pub fn to_base64(root: &Cell) -> String {
    Base64::encode_string(&serialize(root))
}

pub fn to_base64_url(root: &Cell) -> String {
    Base64Url::encode_string(&serialize(root))
}

/// Accepts standard or URL-safe alphabet.
pub fn from_base64(src: &str) -> Result<Cell, BocError> {
    let normalized: String = src
        .trim()
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    let bytes =
        Base64::decode_vec(&normalized).map_err(|e| BocError::Base64(e.to_string()))?;
    deserialize_single(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::cell::CellBuilder;

    fn sample_tree() -> Cell {
        let shared = {
            let mut b = CellBuilder::new();
            b.store_uint(0xdead, 16).unwrap();
            b.build()
        };
        let mut left = CellBuilder::new();
        left.store_bit(true).unwrap().store_ref(shared.clone()).unwrap();
        let mut root = CellBuilder::new();
        root.store_uint(0x0f8a7ea5, 32)
            .unwrap()
            .store_ref(left.build())
            .unwrap()
            .store_ref(shared)
            .unwrap();
        root.build()
    }

    #[test]
    fn serialized_tree_parses_back_with_same_hash() {
        let root = sample_tree();
        let bytes = serialize(&root);
        let parsed = deserialize_single(&bytes).unwrap();
        assert_eq!(parsed.hash(), root.hash());
        assert_eq!(parsed.refs().len(), 2);
    }

    #[test]
    fn shared_cells_are_stored_once() {
        let bytes = serialize(&sample_tree());
        // magic, flags, off_bytes, then cell count
        assert_eq!(&bytes[..4], &BOC_GENERIC_MAGIC);
        assert_eq!(bytes[6], 3);
    }

    #[test]
    fn empty_cell_boc_is_canonical() {
        assert_eq!(to_base64(&Cell::empty()), "te6ccgEBAQEAAgAAAA==");
    }

    #[test]
    fn url_safe_base64_is_accepted() {
        let root = sample_tree();
        let url = to_base64_url(&root);
        assert_eq!(from_base64(&url).unwrap().hash(), root.hash());
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = serialize(&sample_tree());
        assert_eq!(
            deserialize(&bytes[..bytes.len() - 3]).unwrap_err(),
            BocError::Truncated
        );
    }

    /// `len` empty cells, each referencing the next.
    fn linear_chain_boc(len: usize) -> Vec<u8> {
        let size_bytes = bytes_for(len);
        let mut payload = Vec::new();
        for i in 0..len {
            if i + 1 < len {
                payload.extend([1, 0]);
                write_be(&mut payload, i + 1, size_bytes);
            } else {
                payload.extend([0, 0]);
            }
        }
        let off_bytes = bytes_for(payload.len());

        let mut out = BOC_GENERIC_MAGIC.to_vec();
        out.push(size_bytes as u8);
        out.push(off_bytes as u8);
        write_be(&mut out, len, size_bytes);
        write_be(&mut out, 1, size_bytes);
        write_be(&mut out, 0, size_bytes);
        write_be(&mut out, payload.len(), off_bytes);
        write_be(&mut out, 0, size_bytes);
        out.extend(payload);
        out
    }

    #[test]
    fn chain_at_depth_limit_parses() {
        let root = deserialize_single(&linear_chain_boc(1025)).unwrap();
        assert_eq!(root.depth(), 1024);
        assert_eq!(deserialize_single(&serialize(&root)).unwrap().hash(), root.hash());
    }

    #[test]
    fn chain_past_depth_limit_is_malformed() {
        assert!(matches!(
            deserialize(&linear_chain_boc(1026)),
            Err(BocError::Malformed(_))
        ));
        assert!(matches!(
            deserialize(&linear_chain_boc(200_000)),
            Err(BocError::Malformed(_))
        ));
    }

    #[test]
    fn huge_root_count_is_rejected_before_allocating() {
        let mut bytes = BOC_GENERIC_MAGIC.to_vec();
        bytes.extend([0x06, 0x01]);
        write_be(&mut bytes, 1, 6);
        write_be(&mut bytes, 1 << 40, 6);
        write_be(&mut bytes, 0, 6);
        bytes.push(2);
        bytes.extend([0, 0]);
        assert!(matches!(deserialize(&bytes), Err(BocError::Malformed(_))));
    }

    #[test]
    fn huge_cell_count_is_rejected_before_allocating() {
        let mut bytes = BOC_GENERIC_MAGIC.to_vec();
        bytes.extend([0x86, 0x08]);
        write_be(&mut bytes, usize::MAX >> 8, 6);
        write_be(&mut bytes, 1, 6);
        write_be(&mut bytes, 0, 6);
        write_be(&mut bytes, 0, 8);
        assert!(matches!(deserialize(&bytes), Err(BocError::Malformed(_))));
    }

    #[test]
    fn unknown_magic_is_rejected() {
        assert!(matches!(
            deserialize(&[0, 1, 2, 3, 0, 0]),
            Err(BocError::UnsupportedMagic(_))
        ));
    }
}
