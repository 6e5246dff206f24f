// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Balance checks run before an order is handed to a signer.
//!
//! Fees are not part of the check: they are only known approximately and
//! the wallet pays them from what is left (or from the swept balance for
//! send-all transfers).

use crate::blockchain::Coins;

use super::error::TransferError;
use super::order::TokenTransfer;

/// Balances of the sending wallet, as last synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balances {
    /// Native balance in nanotons.
    pub ton: Coins,
    /// Balance of the token being sent, in its base units.
    pub token: Option<Coins>,
}

fn ensure_covered(required: Coins, available: Coins) -> Result<(), TransferError> {
    if required > available {
        return Err(TransferError::InsufficientBalance {
            required,
            available,
        });
    }
    Ok(())
}

/// A native transfer must move something and fit in the balance.
pub fn validate_native(amount: Coins, amount_all: bool, ton_balance: Coins) -> Result<(), TransferError> {
    if amount_all {
        if ton_balance == 0 {
            return Err(TransferError::ZeroAmountRejected);
        }
        return Ok(());
    }
    if amount == 0 {
        return Err(TransferError::ZeroAmountRejected);
    }
    ensure_covered(amount, ton_balance)
}

/// A token transfer needs the tokens plus the TON attached for gas and the
/// forward amount.
pub fn validate_token(transfer: &TokenTransfer, balances: Balances) -> Result<(), TransferError> {
    if transfer.amount == 0 {
        return Err(TransferError::ZeroAmountRejected);
    }
    ensure_covered(transfer.amount, balances.token.unwrap_or(0))?;
    ensure_covered(transfer.attached_value(), balances.ton)
}
