// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hardware signer seam.
//!
//! The device transport lives outside this crate. A [`HardwareSigner`] gets a
//! fully described [`LedgerTransferRequest`] and returns the signed external
//! message body. Device failures are terminal for the attempt: nothing here
//! retries.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::blockchain::cell::Cell;
use crate::blockchain::wallet::StateInit;
use crate::blockchain::{Address, Coins};

use super::error::TransferError;
use super::order::LedgerOrder;
use super::payload::LedgerPayload;

/// Longest comment the device can display.
pub const MAX_LEDGER_COMMENT_LEN: usize = 120;

/// Errors reported by the device. Messages are shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HardwareSignerError {
    #[error("Ledger is locked. Unlock it and try again")]
    Locked,

    #[error("Open the TON app on your Ledger")]
    WrongApp,

    #[error("Transaction was rejected on the device")]
    Rejected,

    #[error("Ledger cannot sign this payload: {0}")]
    UnsupportedPayload(String),

    #[error("Ledger connection failed: {0}")]
    Transport(String),
}

/// Everything the device needs to display and sign a single transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransferRequest {
    pub to: Address,
    pub amount: Coins,
    pub send_mode: u8,
    pub bounce: bool,
    pub seqno: u32,
    /// `valid_until` of the wallet request.
    pub timeout: u32,
    pub state_init: Option<StateInit>,
    pub payload: Option<LedgerPayload>,
}

impl LedgerTransferRequest {
    pub fn from_order(order: &LedgerOrder, seqno: u32, timeout: u32) -> Self {
        let message = &order.message;
        Self {
            to: message.target,
            amount: message.amount,
            send_mode: message.send_mode(),
            bounce: message.bounce,
            seqno,
            timeout,
            state_init: message.state_init.clone(),
            payload: message.payload.clone(),
        }
    }
}

#[async_trait]
pub trait HardwareSigner: Send + Sync {
    /// Sign the transfer on the device, returning the signed request body.
    async fn sign_transfer(&self, request: &LedgerTransferRequest) -> Result<Cell, HardwareSignerError>;
}

/// Reject descriptors the device firmware cannot render.
pub fn check_ledger_payload(payload: &LedgerPayload) -> Result<(), HardwareSignerError> {
    match payload {
        LedgerPayload::Comment { text } => {
            if !text.is_ascii() {
                return Err(HardwareSignerError::UnsupportedPayload(
                    "comment must be ASCII".to_string(),
                ));
            }
            if text.len() > MAX_LEDGER_COMMENT_LEN {
                return Err(HardwareSignerError::UnsupportedPayload(format!(
                    "comment longer than {MAX_LEDGER_COMMENT_LEN} characters"
                )));
            }
            Ok(())
        }
        LedgerPayload::JettonTransfer { .. } => Ok(()),
    }
}

/// Check the order and ask the device to sign it, once.
pub async fn sign_ledger_order(
    signer: &dyn HardwareSigner,
    order: &LedgerOrder,
    seqno: u32,
    timeout: u32,
) -> Result<Cell, TransferError> {
    if let Some(payload) = &order.message.payload {
        check_ledger_payload(payload)?;
    }
    let request = LedgerTransferRequest::from_order(order, seqno, timeout);
    match signer.sign_transfer(&request).await {
        Ok(cell) => {
            info!(seqno, to = %request.to, "Ledger signed transfer");
            Ok(cell)
        }
        Err(e) => {
            warn!(seqno, error = %e, "Ledger signing failed");
            Err(e.into())
        }
    }
}
