// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy of the transfer flow.

use crate::blockchain::cell::CellError;
use crate::blockchain::client::ClientError;
use crate::blockchain::wallet::{WalletError, MAX_MESSAGES};
use crate::blockchain::Coins;

use super::hardware::HardwareSignerError;

/// Errors surfaced by resolution, parsing, order construction and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid domain: {0}")]
    DomainInvalid(String),

    #[error("domain not found: {0}")]
    DomainNotFound(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Coins, available: Coins },

    #[error("amount must be greater than zero")]
    ZeroAmountRejected,

    /// Transient; callers retry silently or degrade.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error(transparent)]
    HardwareSigner(#[from] HardwareSignerError),

    #[error("too many messages: {0} (at most {MAX_MESSAGES})")]
    TooManyMessages(usize),

    #[error("cannot encode transfer: {0}")]
    Encoding(String),
}

impl TransferError {
    /// Short text shown inline next to the offending input.
    pub fn user_message(&self) -> String {
        match self {
            TransferError::InvalidAddress(_) => "Invalid address".to_string(),
            TransferError::DomainInvalid(_) => "Invalid domain name".to_string(),
            TransferError::DomainNotFound(_) => "Domain is not linked to a wallet".to_string(),
            TransferError::InvalidAmount(_) => "Invalid amount".to_string(),
            TransferError::InsufficientBalance { .. } => "Insufficient balance".to_string(),
            TransferError::ZeroAmountRejected => "Amount must be greater than zero".to_string(),
            TransferError::NetworkUnavailable(_) => "Network is unavailable".to_string(),
            // Device errors are shown verbatim.
            TransferError::HardwareSigner(e) => e.to_string(),
            TransferError::TooManyMessages(_) => {
                format!("At most {MAX_MESSAGES} messages per transfer")
            }
            TransferError::Encoding(_) => "Unable to build transfer".to_string(),
        }
    }

    /// Validation failures that must block submission.
    pub fn blocks_submission(&self) -> bool {
        !matches!(self, TransferError::NetworkUnavailable(_))
    }
}

impl From<CellError> for TransferError {
    fn from(e: CellError) -> Self {
        TransferError::Encoding(e.to_string())
    }
}

impl From<WalletError> for TransferError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::TooManyMessages(n) => TransferError::TooManyMessages(n),
            other => TransferError::Encoding(other.to_string()),
        }
    }
}

impl From<ClientError> for TransferError {
    fn from(e: ClientError) -> Self {
        TransferError::NetworkUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_errors_are_shown_verbatim() {
        let err = TransferError::from(HardwareSignerError::Locked);
        assert_eq!(err.user_message(), HardwareSignerError::Locked.to_string());
    }

    #[test]
    fn wallet_limit_maps_to_too_many_messages() {
        let err = TransferError::from(WalletError::TooManyMessages(5));
        assert_eq!(err, TransferError::TooManyMessages(5));
    }

    #[test]
    fn network_errors_do_not_block_submission() {
        let err = TransferError::from(ClientError::Http("timeout".into()));
        assert!(!err.blocks_submission());
        assert!(TransferError::ZeroAmountRejected.blocks_submission());
    }
}
