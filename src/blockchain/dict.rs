// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only access to `Hashmap n X` dictionaries (keys up to 128 bits).

use std::collections::BTreeMap;

use super::cell::{Cell, CellError, CellSlice};

/// Width of a length field that can hold values `0..=max`.
fn len_bits(max: usize) -> usize {
    (usize::BITS - max.leading_zeros()) as usize
}

fn mask(len: usize) -> u128 {
    if len >= 128 {
        u128::MAX
    } else {
        (1u128 << len) - 1
    }
}

/// Parse an `HmLabel` bounded by `max` bits. Returns `(bits, len)`.
fn load_label(slice: &mut CellSlice<'_>, max: usize) -> Result<(u128, usize), CellError> {
    let (value, len) = if !slice.load_bit()? {
        // hml_short$0 len:(Unary ~n) s:(n * Bit)
        let mut len = 0;
        while slice.load_bit()? {
            len += 1;
        }
        if len > max {
            return Err(CellError::InvalidData(format!(
                "label length {len} exceeds {max}"
            )));
        }
        (slice.load_uint(len)?, len)
    } else if !slice.load_bit()? {
        // hml_long$10 n:(#<= m) s:(n * Bit)
        let len = slice.load_uint(len_bits(max))? as usize;
        if len > max {
            return Err(CellError::InvalidData(format!(
                "label length {len} exceeds {max}"
            )));
        }
        (slice.load_uint(len)?, len)
    } else {
        // hml_same$11 v:Bit n:(#<= m)
        let bit = slice.load_bit()?;
        let len = slice.load_uint(len_bits(max))? as usize;
        if len > max {
            return Err(CellError::InvalidData(format!(
                "label length {len} exceeds {max}"
            )));
        }
        (if bit { mask(len) } else { 0 }, len)
    };
    Ok((value, len))
}

/// Look up `key` in a dictionary whose root cell is `root`.
///
/// Only the path to the key is visited. The value is returned as a cell
/// holding the remainder of the leaf.
pub fn lookup(root: &Cell, key_bits: usize, key: u128) -> Result<Option<Cell>, CellError> {
    let mut cell = root;
    let mut remaining = key_bits;
    loop {
        let mut slice = cell.parse();
        let (label, len) = load_label(&mut slice, remaining)?;
        let part = if len == 0 {
            0
        } else {
            (key >> (remaining - len)) & mask(len)
        };
        if part != label {
            return Ok(None);
        }
        remaining -= len;
        if remaining == 0 {
            return slice.to_cell().map(Some);
        }

        let left = slice.load_ref()?;
        let right = slice.load_ref()?;
        let go_right = (key >> (remaining - 1)) & 1 == 1;
        cell = if go_right { &**right } else { &**left };
        remaining -= 1;
    }
}

/// Collect every entry of the dictionary, keyed by its unsigned key value.
pub fn entries(root: &Cell, key_bits: usize) -> Result<BTreeMap<u128, Cell>, CellError> {
    fn walk(
        cell: &Cell,
        remaining: usize,
        prefix: u128,
        out: &mut BTreeMap<u128, Cell>,
    ) -> Result<(), CellError> {
        let mut slice = cell.parse();
        let (label, len) = load_label(&mut slice, remaining)?;
        let prefix = prefix.checked_shl(len as u32).unwrap_or(0) | label;
        let remaining = remaining - len;
        if remaining == 0 {
            out.insert(prefix, slice.to_cell()?);
            return Ok(());
        }
        let left = slice.load_ref()?;
        let right = slice.load_ref()?;
        let prefix = prefix.checked_shl(1).unwrap_or(0);
        walk(left, remaining - 1, prefix, out)?;
        walk(right, remaining - 1, prefix | 1, out)
    }

    let mut out = BTreeMap::new();
    walk(root, key_bits, 0, &mut out)?;
    Ok(out)
}

/// Read a `HashmapE`: a maybe-ref to the root. Empty dictionaries yield no entries.
pub fn load_dict_entries(
    slice: &mut CellSlice<'_>,
    key_bits: usize,
) -> Result<BTreeMap<u128, Cell>, CellError> {
    match slice.load_maybe_ref()? {
        Some(root) => entries(root, key_bits),
        None => Ok(BTreeMap::new()),
    }
}

/// Serialize entries into a `Hashmap n X` root using long labels only.
#[cfg(test)]
pub(crate) fn build_dict(entries: &BTreeMap<u128, Cell>, key_bits: usize) -> Cell {
    use super::cell::CellBuilder;

    fn bit(key: u128, pos: usize) -> u128 {
        (key >> pos) & 1
    }

    fn node(entries: &[(u128, &Cell)], remaining: usize) -> Cell {
        // longest prefix shared by every key, counted from the top unread bit
        let mut common = 0;
        while common < remaining {
            let pos = remaining - 1 - common;
            let first = bit(entries[0].0, pos);
            if entries.iter().any(|(k, _)| bit(*k, pos) != first) {
                break;
            }
            common += 1;
        }

        let mut b = CellBuilder::new();
        b.store_uint(0b10, 2).unwrap();
        b.store_uint(common as u128, len_bits(remaining)).unwrap();
        let label = if common == 0 {
            0
        } else {
            (entries[0].0 >> (remaining - common)) & mask(common)
        };
        b.store_uint(label, common).unwrap();

        let remaining = remaining - common;
        if remaining == 0 {
            b.store_cell_contents(entries[0].1).unwrap();
        } else {
            let pos = remaining - 1;
            let (left, right): (Vec<_>, Vec<_>) =
                entries.iter().copied().partition(|(k, _)| bit(*k, pos) == 0);
            b.store_ref(node(&left, pos)).unwrap();
            b.store_ref(node(&right, pos)).unwrap();
        }
        b.build()
    }

    let list: Vec<(u128, &Cell)> = entries.iter().map(|(k, v)| (*k, v)).collect();
    node(&list, key_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::cell::CellBuilder;

    /// Single-entry dictionary with a `hml_long` label carrying the whole key.
    fn single_entry(key: u32, value: u8) -> Cell {
        let mut b = CellBuilder::new();
        b.store_uint(0b10, 2).unwrap();
        b.store_uint(32, len_bits(32)).unwrap();
        b.store_uint(key as u128, 32).unwrap();
        b.store_uint(value as u128, 8).unwrap();
        b.build()
    }

    /// Keys 0 and 1: a 31-bit `hml_same` zero label, then two empty-label leaves.
    fn two_entries() -> Cell {
        let leaf = |value: u8| {
            let mut b = CellBuilder::new();
            b.store_uint(0b00, 2).unwrap();
            b.store_uint(value as u128, 8).unwrap();
            b.build()
        };
        let mut root = CellBuilder::new();
        root.store_uint(0b11, 2).unwrap();
        root.store_bit(false).unwrap();
        root.store_uint(31, len_bits(32)).unwrap();
        root.store_ref(leaf(10)).unwrap();
        root.store_ref(leaf(11)).unwrap();
        root.build()
    }

    #[test]
    fn len_bits_matches_log2_ceiling() {
        assert_eq!(len_bits(0), 0);
        assert_eq!(len_bits(1), 1);
        assert_eq!(len_bits(31), 5);
        assert_eq!(len_bits(32), 6);
    }

    #[test]
    fn lookup_single_entry() {
        let dict = single_entry(18, 7);
        let value = lookup(&dict, 32, 18).unwrap().unwrap();
        assert_eq!(value.parse().load_u8().unwrap(), 7);
        assert!(lookup(&dict, 32, 19).unwrap().is_none());
    }

    #[test]
    fn lookup_follows_fork() {
        let dict = two_entries();
        assert_eq!(
            lookup(&dict, 32, 0).unwrap().unwrap().parse().load_u8().unwrap(),
            10
        );
        assert_eq!(
            lookup(&dict, 32, 1).unwrap().unwrap().parse().load_u8().unwrap(),
            11
        );
        assert!(lookup(&dict, 32, 2).unwrap().is_none());
    }

    #[test]
    fn entries_walks_every_leaf() {
        let all = entries(&two_entries(), 32).unwrap();
        let keys: Vec<u128> = all.keys().copied().collect();
        assert_eq!(keys, vec![0, 1]);
    }

    #[test]
    fn built_dictionary_reads_back() {
        let mut source = BTreeMap::new();
        for key in [18u128, 20, 21, 24, 25] {
            let mut b = CellBuilder::new();
            b.store_uint(key * 3, 16).unwrap();
            source.insert(key, b.build());
        }
        let root = build_dict(&source, 32);
        for key in [18u128, 20, 21, 24, 25] {
            let value = lookup(&root, 32, key).unwrap().unwrap();
            assert_eq!(value.parse().load_u16().unwrap() as u128, key * 3);
        }
        assert!(lookup(&root, 32, 19).unwrap().is_none());
        assert_eq!(entries(&root, 32).unwrap().len(), 5);
    }

    #[test]
    fn empty_hashmap_e_has_no_entries() {
        let mut b = CellBuilder::new();
        b.store_bit(false).unwrap();
        let cell = b.build();
        assert!(load_dict_entries(&mut cell.parse(), 32).unwrap().is_empty());
    }
}
