// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # In-Process Storage
//!
//! State that outlives a single request but not the process:
//!
//! - `pending` - transfers broadcast but not yet seen in the wallet history
//! - `sessions` - open transfer sessions, LRU-bounded with idle eviction
//!
//! Nothing here is persisted; a restart starts from an empty store and the
//! account sync repopulates nothing (pending entries are a UI convenience).

pub mod pending;
pub mod sessions;

pub use pending::{
    BatchEntry, BroadcastOutcome, PendingBody, PendingError, PendingStatus, PendingTransaction,
    PendingTransactionStore, DEFAULT_GRACE_PERIOD,
};
pub use sessions::SessionRegistry;
