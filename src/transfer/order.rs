// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transfer orders and the pure functions that build them.
//!
//! An [`Order`] is everything needed to produce the wallet request: target,
//! amount, payload and send mode of each outgoing message. Orders are never
//! mutated; any input change rebuilds the order from scratch. Builders do not
//! look at balances or the network.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::blockchain::cell::Cell;
use crate::blockchain::types::coins_string;
use crate::blockchain::wallet::{
    InternalMessage, OutgoingMessage, StateInit, MAX_MESSAGES, SEND_MODE_CARRY_ALL_BALANCE,
    SEND_MODE_DEFAULT,
};
use crate::blockchain::{Address, Coins};

use super::error::TransferError;
use super::payload::{comment_cell, JettonTransferBody, LedgerPayload};

/// TON attached to a jetton transfer to pay for the jetton wallets' gas.
pub const JETTON_TRANSFER_GAS: Coins = 50_000_000;

/// Forwarded to the recipient's owner with the transfer notification.
pub const DEFAULT_FORWARD_TON_AMOUNT: Coins = 20_000_000;

fn send_mode(amount_all: bool) -> u8 {
    if amount_all {
        SEND_MODE_CARRY_ALL_BALANCE
    } else {
        SEND_MODE_DEFAULT
    }
}

/// One outgoing message of a software-signed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMessage {
    pub target: Address,
    #[serde(with = "coins_string")]
    pub amount: Coins,
    #[serde(default)]
    pub amount_all: bool,
    #[serde(default)]
    pub payload: Option<Arc<Cell>>,
    #[serde(default)]
    pub state_init: Option<StateInit>,
    pub bounce: bool,
}

impl OrderMessage {
    pub fn send_mode(&self) -> u8 {
        send_mode(self.amount_all)
    }
}

/// Single message signed on a hardware device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMessage {
    pub target: Address,
    #[serde(with = "coins_string")]
    pub amount: Coins,
    #[serde(default)]
    pub amount_all: bool,
    #[serde(default)]
    pub payload: Option<LedgerPayload>,
    #[serde(default)]
    pub state_init: Option<StateInit>,
    pub bounce: bool,
}

impl LedgerMessage {
    pub fn send_mode(&self) -> u8 {
        send_mode(self.amount_all)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareOrder {
    pub messages: Vec<OrderMessage>,
}

impl SoftwareOrder {
    /// Several messages in one wallet request.
    pub fn batch(messages: Vec<OrderMessage>) -> Result<Self, TransferError> {
        let order = Self { messages };
        order.check()?;
        Ok(order)
    }

    fn check(&self) -> Result<(), TransferError> {
        if self.messages.is_empty() {
            return Err(TransferError::Encoding("order has no messages".to_string()));
        }
        if self.messages.len() > MAX_MESSAGES {
            return Err(TransferError::TooManyMessages(self.messages.len()));
        }
        if self.messages.iter().any(|m| m.amount_all && m.amount != 0) {
            return Err(TransferError::InvalidAmount(
                "send-all messages must carry a zero amount".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerOrder {
    pub message: LedgerMessage,
}

/// A transfer order, tagged by who signs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Order {
    Software(SoftwareOrder),
    Ledger(LedgerOrder),
}

impl From<SoftwareOrder> for Order {
    fn from(order: SoftwareOrder) -> Self {
        Order::Software(order)
    }
}

impl From<LedgerOrder> for Order {
    fn from(order: LedgerOrder) -> Self {
        Order::Ledger(order)
    }
}

/// An order message reduced to what the wallet request needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedMessage {
    pub target: Address,
    pub amount: Coins,
    pub send_mode: u8,
    pub bounce: bool,
    pub body: Option<Cell>,
    pub state_init: Option<StateInit>,
}

impl PreparedMessage {
    /// Entry of the wallet v4 request.
    pub fn outgoing(&self) -> Result<OutgoingMessage, TransferError> {
        let message = InternalMessage {
            to: &self.target,
            value: self.amount,
            bounce: self.bounce,
            state_init: self.state_init.as_ref(),
            body: self.body.as_ref(),
        }
        .to_cell()?;
        Ok(OutgoingMessage {
            send_mode: self.send_mode,
            message,
        })
    }
}

impl Order {
    /// Check invariants of an order received from outside.
    pub fn validate(&self) -> Result<(), TransferError> {
        match self {
            Order::Software(order) => order.check(),
            Order::Ledger(order) if order.message.amount_all && order.message.amount != 0 => {
                Err(TransferError::InvalidAmount(
                    "send-all messages must carry a zero amount".to_string(),
                ))
            }
            Order::Ledger(_) => Ok(()),
        }
    }

    /// SHA-256 of the order's JSON form, hex encoded.
    pub fn hash(&self) -> Result<String, TransferError> {
        let json = serde_json::to_vec(self).map_err(|e| TransferError::Encoding(e.to_string()))?;
        Ok(hex::encode(Sha256::digest(&json)))
    }

    pub fn message_count(&self) -> usize {
        match self {
            Order::Software(order) => order.messages.len(),
            Order::Ledger(_) => 1,
        }
    }

    /// Whether any message sweeps the whole balance.
    pub fn sends_all(&self) -> bool {
        match self {
            Order::Software(order) => order.messages.iter().any(|m| m.amount_all),
            Order::Ledger(order) => order.message.amount_all,
        }
    }

    /// Sum of the TON values attached to the messages.
    pub fn total_value(&self) -> Coins {
        match self {
            Order::Software(order) => order.messages.iter().map(|m| m.amount).sum(),
            Order::Ledger(order) => order.message.amount,
        }
    }

    pub fn prepared_messages(&self) -> Result<Vec<PreparedMessage>, TransferError> {
        match self {
            Order::Software(order) => Ok(order
                .messages
                .iter()
                .map(|m| PreparedMessage {
                    target: m.target,
                    amount: m.amount,
                    send_mode: m.send_mode(),
                    bounce: m.bounce,
                    body: m.payload.as_deref().cloned(),
                    state_init: m.state_init.clone(),
                })
                .collect()),
            Order::Ledger(order) => {
                let m = &order.message;
                let body = m.payload.as_ref().map(LedgerPayload::to_cell).transpose()?;
                Ok(vec![PreparedMessage {
                    target: m.target,
                    amount: m.amount,
                    send_mode: m.send_mode(),
                    bounce: m.bounce,
                    body,
                    state_init: m.state_init.clone(),
                }])
            }
        }
    }
}

// =============================================================================
// Builders
// =============================================================================

/// A native TON transfer as entered by the user.
#[derive(Debug, Clone)]
pub struct NativeTransfer {
    pub target: Address,
    /// Bounce flag of the target's friendly form.
    pub bounce: bool,
    pub amount: Coins,
    pub amount_all: bool,
    pub comment: Option<String>,
    pub state_init: Option<StateInit>,
}

impl NativeTransfer {
    fn amount(&self) -> Coins {
        if self.amount_all {
            0
        } else {
            self.amount
        }
    }

    fn comment(&self) -> Option<&str> {
        self.comment.as_deref().filter(|c| !c.is_empty())
    }
}

/// A jetton transfer as entered by the user.
#[derive(Debug, Clone)]
pub struct TokenTransfer {
    /// The sender's jetton wallet; the order is addressed to it.
    pub wallet_address: Address,
    pub target: Address,
    /// Receives the excess TON; normally the sender's own wallet.
    pub response_target: Address,
    /// Jetton amount in the token's base units.
    pub amount: Coins,
    pub ton_forward_amount: Option<Coins>,
    pub comment: Option<String>,
    pub query_id: Option<u64>,
}

impl TokenTransfer {
    pub fn forward_amount(&self) -> Coins {
        match self.ton_forward_amount {
            Some(amount) if amount > 0 => amount,
            _ => DEFAULT_FORWARD_TON_AMOUNT,
        }
    }

    /// TON that must accompany the jetton transfer request.
    pub fn attached_value(&self) -> Coins {
        JETTON_TRANSFER_GAS + self.forward_amount()
    }

    fn comment(&self) -> Option<&str> {
        self.comment.as_deref().filter(|c| !c.is_empty())
    }
}

pub fn build_native_order(transfer: NativeTransfer) -> Result<SoftwareOrder, TransferError> {
    let payload = transfer
        .comment()
        .map(comment_cell)
        .transpose()?
        .map(Arc::new);
    Ok(SoftwareOrder {
        messages: vec![OrderMessage {
            target: transfer.target,
            amount: transfer.amount(),
            amount_all: transfer.amount_all,
            payload,
            state_init: transfer.state_init,
            bounce: transfer.bounce,
        }],
    })
}

pub fn build_token_order(transfer: TokenTransfer) -> Result<SoftwareOrder, TransferError> {
    let forward_payload = transfer
        .comment()
        .map(comment_cell)
        .transpose()?
        .map(Arc::new);
    let body = JettonTransferBody {
        query_id: transfer.query_id.unwrap_or(0),
        amount: transfer.amount,
        destination: transfer.target,
        response_destination: Some(transfer.response_target),
        custom_payload: None,
        forward_ton_amount: transfer.forward_amount(),
        forward_payload,
    }
    .to_cell()?;
    Ok(SoftwareOrder {
        messages: vec![OrderMessage {
            target: transfer.wallet_address,
            amount: transfer.attached_value(),
            amount_all: false,
            payload: Some(Arc::new(body)),
            state_init: None,
            bounce: true,
        }],
    })
}

pub fn build_ledger_native_order(transfer: NativeTransfer) -> LedgerOrder {
    let payload = transfer.comment().map(|text| LedgerPayload::Comment {
        text: text.to_string(),
    });
    LedgerOrder {
        message: LedgerMessage {
            target: transfer.target,
            amount: transfer.amount(),
            amount_all: transfer.amount_all,
            payload,
            state_init: transfer.state_init,
            bounce: transfer.bounce,
        },
    }
}

pub fn build_ledger_token_order(transfer: TokenTransfer) -> Result<LedgerOrder, TransferError> {
    let forward_payload = transfer
        .comment()
        .map(comment_cell)
        .transpose()?
        .map(Arc::new);
    Ok(LedgerOrder {
        message: LedgerMessage {
            target: transfer.wallet_address,
            amount: transfer.attached_value(),
            amount_all: false,
            payload: Some(LedgerPayload::JettonTransfer {
                query_id: transfer.query_id,
                amount: transfer.amount,
                destination: transfer.target,
                response_destination: transfer.response_target,
                custom_payload: None,
                forward_amount: transfer.forward_amount(),
                forward_payload,
            }),
            state_init: None,
            bounce: true,
        },
    })
}
