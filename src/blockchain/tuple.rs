// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TVM stack values used as get-method arguments and results.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Deserialize;

use super::cell::{Cell, CellBuilder, CellError};

/// A single TVM stack entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TupleItem {
    Null,
    Int(i128),
    /// Non-negative integer wider than `i128` (e.g. a SHA-256 digest).
    UInt256([u8; 32]),
    Cell(Arc<Cell>),
    Slice(Arc<Cell>),
    Tuple(Vec<TupleItem>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TupleError {
    #[error("stack is exhausted")]
    Exhausted,

    #[error("expected {expected} on stack, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid stack value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Cell(#[from] CellError),
}

impl TupleItem {
    fn type_name(&self) -> &'static str {
        match self {
            TupleItem::Null => "null",
            TupleItem::Int(_) | TupleItem::UInt256(_) => "int",
            TupleItem::Cell(_) => "cell",
            TupleItem::Slice(_) => "slice",
            TupleItem::Tuple(_) => "tuple",
        }
    }

    fn store(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        match self {
            TupleItem::Null => {
                builder.store_uint(0x00, 8)?;
            }
            TupleItem::Int(value) => {
                if i64::try_from(*value).is_ok() {
                    builder.store_uint(0x01, 8)?.store_int(*value, 64)?;
                } else {
                    builder.store_uint(0x0100, 15)?.store_int(*value, 257)?;
                }
            }
            TupleItem::UInt256(bytes) => {
                builder
                    .store_uint(0x0100, 15)?
                    .store_bit(false)?
                    .store_bytes(bytes)?;
            }
            TupleItem::Cell(cell) => {
                builder.store_uint(0x03, 8)?.store_ref(cell.clone())?;
            }
            TupleItem::Slice(cell) => {
                builder
                    .store_uint(0x04, 8)?
                    .store_uint(0, 10)?
                    .store_uint(cell.bit_len() as u128, 10)?
                    .store_uint(0, 3)?
                    .store_uint(cell.refs().len() as u128, 3)?
                    .store_ref(cell.clone())?;
            }
            TupleItem::Tuple(_) => {
                return Err(CellError::InvalidData(
                    "tuple arguments are not supported".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Serialize a stack as a `VmStack` cell: depth, then a ref chain of the
/// remaining entries followed by the top entry.
pub fn serialize_tuple(items: &[TupleItem]) -> Result<Cell, CellError> {
    fn tail(items: &[TupleItem], builder: &mut CellBuilder) -> Result<(), CellError> {
        if let Some((last, rest)) = items.split_last() {
            let mut rest_builder = CellBuilder::new();
            tail(rest, &mut rest_builder)?;
            builder.store_ref(rest_builder.build())?;
            last.store(builder)?;
        }
        Ok(())
    }

    let mut builder = CellBuilder::new();
    builder.store_uint(items.len() as u128, 24)?;
    tail(items, &mut builder)?;
    Ok(builder.build())
}

/// Sequential reader over get-method results.
#[derive(Debug, Clone)]
pub struct TupleReader {
    items: VecDeque<TupleItem>,
}

impl TupleReader {
    pub fn new(items: Vec<TupleItem>) -> Self {
        Self {
            items: items.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }

    fn pop(&mut self) -> Result<TupleItem, TupleError> {
        self.items.pop_front().ok_or(TupleError::Exhausted)
    }

    pub fn read_int(&mut self) -> Result<i128, TupleError> {
        match self.pop()? {
            TupleItem::Int(value) => Ok(value),
            other => Err(TupleError::UnexpectedType {
                expected: "int",
                found: other.type_name(),
            }),
        }
    }

    /// Cell, slice or builder contents; `None` for a null entry.
    pub fn read_cell_opt(&mut self) -> Result<Option<Arc<Cell>>, TupleError> {
        match self.pop()? {
            TupleItem::Null => Ok(None),
            TupleItem::Cell(cell) | TupleItem::Slice(cell) => Ok(Some(cell)),
            other => Err(TupleError::UnexpectedType {
                expected: "cell",
                found: other.type_name(),
            }),
        }
    }
}

/// JSON stack entry as returned by the v4 HTTP API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireTupleItem {
    Null,
    Int { value: String },
    Nan,
    Cell { cell: String },
    Slice { cell: String },
    Builder { cell: String },
    Tuple { items: Vec<WireTupleItem> },
}

impl TryFrom<WireTupleItem> for TupleItem {
    type Error = TupleError;

    fn try_from(item: WireTupleItem) -> Result<Self, Self::Error> {
        let decode = |cell: &str| {
            Cell::from_boc_base64(cell)
                .map(Arc::new)
                .map_err(|e| TupleError::InvalidValue(e.to_string()))
        };
        match item {
            WireTupleItem::Null => Ok(TupleItem::Null),
            WireTupleItem::Nan => Err(TupleError::InvalidValue("NaN".to_string())),
            WireTupleItem::Int { value } => parse_int(&value),
            WireTupleItem::Cell { cell } => decode(&cell).map(TupleItem::Cell),
            WireTupleItem::Slice { cell } | WireTupleItem::Builder { cell } => {
                decode(&cell).map(TupleItem::Slice)
            }
            WireTupleItem::Tuple { items } => items
                .into_iter()
                .map(TupleItem::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(TupleItem::Tuple),
        }
    }
}

/// Decimal integer; values beyond `i128` must be non-negative and fit 256 bits.
fn parse_int(value: &str) -> Result<TupleItem, TupleError> {
    if let Ok(v) = value.parse::<i128>() {
        return Ok(TupleItem::Int(v));
    }
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TupleError::InvalidValue(format!("bad integer `{value}`")));
    }

    let mut bytes = [0u8; 32];
    for digit in value.bytes().map(|b| b - b'0') {
        let mut carry = digit as u16;
        for byte in bytes.iter_mut().rev() {
            let v = (*byte as u16) * 10 + carry;
            *byte = v as u8;
            carry = v >> 8;
        }
        if carry != 0 {
            return Err(TupleError::InvalidValue(format!(
                "integer `{value}` exceeds 256 bits"
            )));
        }
    }
    Ok(TupleItem::UInt256(bytes))
}
