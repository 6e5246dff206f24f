// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Message bodies carried by transfer orders.
//!
//! Two bodies are built here: the plain text comment (`op = 0`) and the
//! jetton `transfer` request sent to the sender's jetton wallet. Both can
//! also be described as a [`LedgerPayload`], the form a hardware signer
//! displays and signs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blockchain::cell::{Cell, CellBuilder, CellError, CellSlice};
use crate::blockchain::types::coins_string;
use crate::blockchain::{Address, Coins};

/// Text comment opcode.
pub const OP_COMMENT: u32 = 0;

/// `transfer#0f8a7ea5` (TEP-74).
pub const OP_JETTON_TRANSFER: u32 = 0x0f8a_7ea5;

/// Text comment body: `op = 0` followed by the UTF-8 text as a snake.
pub fn comment_cell(text: &str) -> Result<Cell, CellError> {
    let mut b = CellBuilder::new();
    b.store_uint(OP_COMMENT as u128, 32)?
        .store_snake_bytes(text.as_bytes())?;
    Ok(b.build())
}

/// Read a text comment back. Returns `None` for any other body.
pub fn parse_comment(cell: &Cell) -> Option<String> {
    let mut slice = cell.parse();
    if slice.remaining_bits() < 32 || slice.load_u32().ok()? != OP_COMMENT {
        return None;
    }
    let bytes = load_snake_bytes(slice).ok()?;
    String::from_utf8(bytes).ok()
}

fn load_snake_bytes(mut slice: CellSlice<'_>) -> Result<Vec<u8>, CellError> {
    let mut out = Vec::new();
    loop {
        let len = slice.remaining_bits() / 8;
        out.extend(slice.load_bytes(len)?);
        if slice.remaining_refs() == 0 {
            return Ok(out);
        }
        slice = slice.load_ref()?.parse();
    }
}

/// Body of a jetton `transfer` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JettonTransferBody {
    pub query_id: u64,
    pub amount: Coins,
    pub destination: Address,
    pub response_destination: Option<Address>,
    pub custom_payload: Option<Arc<Cell>>,
    pub forward_ton_amount: Coins,
    pub forward_payload: Option<Arc<Cell>>,
}

impl JettonTransferBody {
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_uint(OP_JETTON_TRANSFER as u128, 32)?
            .store_uint(self.query_id as u128, 64)?
            .store_coins(self.amount)?
            .store_address(Some(&self.destination))?
            .store_address(self.response_destination.as_ref())?
            .store_maybe_ref(self.custom_payload.clone())?
            .store_coins(self.forward_ton_amount)?;
        // forward_payload:(Either Cell ^Cell); always by reference when present.
        match &self.forward_payload {
            Some(payload) => b.store_bit(true)?.store_ref(payload.clone())?,
            None => b.store_bit(false)?,
        };
        Ok(b.build())
    }

    /// Decode a body produced by [`JettonTransferBody::to_cell`] or any
    /// TEP-74 compliant wallet. Inline forward payloads are copied out.
    pub fn parse(cell: &Cell) -> Result<Self, CellError> {
        let mut s = cell.parse();
        let op = s.load_u32()?;
        if op != OP_JETTON_TRANSFER {
            return Err(CellError::InvalidData(format!(
                "not a jetton transfer (op {op:#010x})"
            )));
        }
        let query_id = s.load_u64()?;
        let amount = s.load_coins()?;
        let destination = s
            .load_address()?
            .ok_or_else(|| CellError::InvalidData("missing destination".to_string()))?;
        let response_destination = s.load_address()?;
        let custom_payload = s.load_maybe_ref()?.cloned();
        let forward_ton_amount = s.load_coins()?;
        let forward_payload = if s.load_bit()? {
            Some(s.load_ref()?.clone())
        } else if s.remaining_bits() > 0 || s.remaining_refs() > 0 {
            Some(Arc::new(s.to_cell()?))
        } else {
            None
        };
        Ok(Self {
            query_id,
            amount,
            destination,
            response_destination,
            custom_payload,
            forward_ton_amount,
            forward_payload,
        })
    }
}

/// Payload descriptor understood by the hardware signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LedgerPayload {
    Comment {
        text: String,
    },
    JettonTransfer {
        #[serde(default)]
        query_id: Option<u64>,
        #[serde(with = "coins_string")]
        amount: Coins,
        destination: Address,
        response_destination: Address,
        #[serde(default)]
        custom_payload: Option<Arc<Cell>>,
        #[serde(with = "coins_string")]
        forward_amount: Coins,
        #[serde(default)]
        forward_payload: Option<Arc<Cell>>,
    },
}

impl LedgerPayload {
    /// The body cell the device will produce for this descriptor.
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        match self {
            LedgerPayload::Comment { text } => comment_cell(text),
            LedgerPayload::JettonTransfer {
                query_id,
                amount,
                destination,
                response_destination,
                custom_payload,
                forward_amount,
                forward_payload,
            } => JettonTransferBody {
                query_id: query_id.unwrap_or(0),
                amount: *amount,
                destination: *destination,
                response_destination: Some(*response_destination),
                custom_payload: custom_payload.clone(),
                forward_ton_amount: *forward_amount,
                forward_payload: forward_payload.clone(),
            }
            .to_cell(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new(0, [byte; 32])
    }

    #[test]
    fn comment_round_trip() {
        let cell = comment_cell("thanks for lunch").unwrap();
        assert_eq!(cell.bit_len(), 32 + 16 * 8);
        assert_eq!(parse_comment(&cell).as_deref(), Some("thanks for lunch"));
    }

    #[test]
    fn long_comment_spills_into_refs() {
        let text = "x".repeat(300);
        let cell = comment_cell(&text).unwrap();
        // 123 bytes fit next to the opcode, 127 per following cell.
        assert_eq!(cell.bit_len(), 32 + 123 * 8);
        assert_eq!(cell.refs()[0].bit_len(), 127 * 8);
        assert_eq!(cell.refs()[0].refs()[0].bit_len(), 50 * 8);
        assert_eq!(parse_comment(&cell).unwrap(), text);
    }

    #[test]
    fn non_comment_bodies_are_not_comments() {
        let body = JettonTransferBody {
            query_id: 1,
            amount: 5,
            destination: addr(1),
            response_destination: None,
            custom_payload: None,
            forward_ton_amount: 0,
            forward_payload: None,
        };
        assert_eq!(parse_comment(&body.to_cell().unwrap()), None);
        assert_eq!(parse_comment(&Cell::empty()), None);
    }

    #[test]
    fn jetton_body_layout() {
        let forward = Arc::new(comment_cell("hi").unwrap());
        let body = JettonTransferBody {
            query_id: 42,
            amount: 1_500_000,
            destination: addr(1),
            response_destination: Some(addr(2)),
            custom_payload: None,
            forward_ton_amount: 20_000_000,
            forward_payload: Some(forward.clone()),
        };
        let cell = body.to_cell().unwrap();
        let mut s = cell.parse();
        assert_eq!(s.load_u32().unwrap(), OP_JETTON_TRANSFER);
        assert_eq!(s.load_u64().unwrap(), 42);
        assert_eq!(cell.refs().len(), 1);
        assert_eq!(cell.refs()[0].hash(), forward.hash());
        assert_eq!(JettonTransferBody::parse(&cell).unwrap(), body);
    }

    #[test]
    fn ledger_descriptor_serializes_with_type_tag() {
        let payload = LedgerPayload::JettonTransfer {
            query_id: None,
            amount: 10,
            destination: addr(1),
            response_destination: addr(2),
            custom_payload: None,
            forward_amount: 20_000_000,
            forward_payload: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "jetton-transfer");
        assert_eq!(json["forward_amount"], "20000000");
        let back: LedgerPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);

        let comment = serde_json::to_value(LedgerPayload::Comment {
            text: "hello".into(),
        })
        .unwrap();
        assert_eq!(comment, serde_json::json!({"type": "comment", "text": "hello"}));
    }

    #[test]
    fn ledger_comment_matches_software_body() {
        let ledger = LedgerPayload::Comment {
            text: "memo".into(),
        };
        assert_eq!(ledger.to_cell().unwrap(), comment_cell("memo").unwrap());
    }
}
