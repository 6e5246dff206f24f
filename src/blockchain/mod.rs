// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TON blockchain integration.
//!
//! This module provides:
//! - Cell, bag-of-cells, address and dictionary codecs
//! - A read-only client for the v4 HTTP API, with retry/backoff
//! - Network fee configuration and the fee formulas
//! - Wallet v4 message construction

pub mod address;
pub mod boc;
pub mod cell;
pub mod client;
pub mod dict;
pub mod fees;
pub mod retry;
pub mod tuple;
pub mod types;
pub mod wallet;

pub use address::{Address, AddressError};
pub use cell::{Cell, CellBuilder, CellError, CellSlice};
pub use client::{AccountState, BlockRef, Client4, ClientError, StorageStat, TonClient};
pub use fees::FeeConfig;
pub use types::*;
pub use wallet::{StateInit, WalletV4};
