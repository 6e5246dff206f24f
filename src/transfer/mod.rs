// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transfer construction.
//!
//! Input flows one way: the [`resolver`] and [`amount`] parser normalize
//! what the user typed, the [`order`] builders turn it into an [`Order`],
//! and the [`fee`] estimator prices that order for display. The
//! [`session`] module glues the pieces together per open transfer form.

pub mod amount;
pub mod error;
pub mod fee;
pub mod hardware;
pub mod order;
pub mod payload;
pub mod resolver;
pub mod session;
pub mod validation;

pub use amount::{format_amount, parse_amount};
pub use error::TransferError;
pub use fee::{FeeEstimator, FeeQuote, WalletSnapshot};
pub use hardware::{HardwareSigner, HardwareSignerError, LedgerTransferRequest};
pub use order::{LedgerOrder, Order, OrderMessage, SoftwareOrder};
pub use resolver::{AddressResolver, ResolvedTarget};
pub use session::{
    PreparedTransfer, SessionSettings, SignerKind, TokenIntent, TransferIntent, TransferSession,
};
