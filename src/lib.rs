// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TON Transfer Service - outbound transfers for a TON wallet
//!
//! This crate builds protocol-correct transfer orders for native TON and
//! jettons, prices them against live network state, and tracks broadcast
//! transfers until they are observed on chain.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `blockchain` - Cell codecs, v4 HTTP API client, fee formulas, wallet v4
//! - `transfer` - Address/domain resolution, amounts, orders, fee estimation
//! - `storage` - In-process pending transaction store
//! - `sync` - Background account sync (seqno reconciliation, fee config)

pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod sync;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;
