// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pending transaction store.
//!
//! Tracks transfers that were broadcast but are not yet reflected in the
//! wallet's history. Lifecycle of an entry:
//!
//! ```text
//! add ──► Pending ──mark_sent──► Sent ──(grace window)──► removed
//!            │                     │
//!            └──────── remove ─────┴──► removed
//! ```
//!
//! All writes go through one `watch` channel, which also notifies
//! subscribers of every change. A `Sent` entry never returns to `Pending`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::blockchain::cell::Cell;
use crate::blockchain::types::coins_string;
use crate::blockchain::{Address, Coins};
use crate::transfer::order::Order;
use crate::transfer::payload::{parse_comment, JettonTransferBody};

/// Default time a sent entry stays visible before it is dropped.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PendingError {
    #[error("pending transaction {0} already exists")]
    DuplicateId(Uuid),

    #[error("pending transaction {0} not found")]
    NotFound(Uuid),

    #[error("cannot record order: {0}")]
    InvalidOrder(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    /// Broadcast, not yet seen on chain.
    Pending,
    /// Seen on chain; removed after the grace window.
    Sent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub to: Address,
    #[serde(with = "coins_string")]
    pub amount: Coins,
}

/// What the transfer carried, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingBody {
    Payload {
        cell: Arc<Cell>,
    },
    Comment {
        text: String,
    },
    TokenTransfer {
        #[serde(with = "coins_string")]
        amount: Coins,
        master: Address,
        target: Address,
    },
    Batch {
        messages: Vec<BatchEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub id: Uuid,
    #[serde(with = "coins_string")]
    pub amount: Coins,
    pub counterparty: Option<Address>,
    pub body: Option<PendingBody>,
    #[serde(with = "coins_string")]
    pub fees: Coins,
    pub seqno: u32,
    /// Hex hash of the external message.
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub status: PendingStatus,
}

/// Result of handing a signed transfer to the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BroadcastOutcome {
    Success {
        seqno: u32,
        hash: String,
        #[serde(with = "coins_string")]
        fees: Coins,
    },
    Failure {
        reason: String,
    },
}

impl PendingTransaction {
    /// Describe a broadcast order. Token transfers are recognised by their
    /// body; `token_master` names the jetton for display.
    pub fn from_order(
        order: &Order,
        seqno: u32,
        hash: String,
        fees: Coins,
        token_master: Option<Address>,
    ) -> Result<Self, PendingError> {
        let messages = order
            .prepared_messages()
            .map_err(|e| PendingError::InvalidOrder(e.to_string()))?;

        let (amount, counterparty, body) = match messages.as_slice() {
            [] => return Err(PendingError::InvalidOrder("order has no messages".to_string())),
            [single] => {
                let jetton = single
                    .body
                    .as_ref()
                    .and_then(|b| JettonTransferBody::parse(b).ok());
                match (jetton, token_master) {
                    (Some(jetton), Some(master)) => (
                        jetton.amount,
                        Some(jetton.destination),
                        Some(PendingBody::TokenTransfer {
                            amount: jetton.amount,
                            master,
                            target: jetton.destination,
                        }),
                    ),
                    _ => {
                        let body = single.body.as_ref().map(|cell| match parse_comment(cell) {
                            Some(text) => PendingBody::Comment { text },
                            None => PendingBody::Payload {
                                cell: Arc::new(cell.clone()),
                            },
                        });
                        (single.amount, Some(single.target), body)
                    }
                }
            }
            many => (
                many.iter().map(|m| m.amount).sum(),
                None,
                Some(PendingBody::Batch {
                    messages: many
                        .iter()
                        .map(|m| BatchEntry {
                            to: m.target,
                            amount: m.amount,
                        })
                        .collect(),
                }),
            ),
        };

        Ok(Self {
            id: Uuid::new_v4(),
            amount,
            counterparty,
            body,
            fees,
            seqno,
            hash,
            created_at: Utc::now(),
            status: PendingStatus::Pending,
        })
    }
}

struct Inner {
    entries: watch::Sender<Vec<PendingTransaction>>,
    grace: Duration,
    shutdown: CancellationToken,
    /// Removal timer per sent entry; children of `shutdown`.
    timers: Mutex<HashMap<Uuid, CancellationToken>>,
}

/// Shared handle to the pending store; clones refer to the same entries.
#[derive(Clone)]
pub struct PendingTransactionStore {
    inner: Arc<Inner>,
}

impl Default for PendingTransactionStore {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl PendingTransactionStore {
    pub fn new(grace: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: watch::Sender::new(Vec::new()),
                grace,
                shutdown: CancellationToken::new(),
                timers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Append a new entry (newest last).
    pub fn add(&self, tx: PendingTransaction) -> Result<(), PendingError> {
        let id = tx.id;
        let seqno = tx.seqno;
        let mut duplicate = false;
        self.inner.entries.send_if_modified(|entries| {
            if entries.iter().any(|e| e.id == id) {
                duplicate = true;
                return false;
            }
            entries.push(tx);
            true
        });
        if duplicate {
            error!(%id, "Pending transaction added twice");
            return Err(PendingError::DuplicateId(id));
        }
        info!(%id, seqno, "Pending transaction added");
        Ok(())
    }

    /// Record a broadcast. Failed broadcasts leave the store untouched.
    pub fn record_broadcast(
        &self,
        order: &Order,
        outcome: &BroadcastOutcome,
        token_master: Option<Address>,
    ) -> Result<Option<PendingTransaction>, PendingError> {
        match outcome {
            BroadcastOutcome::Success { seqno, hash, fees } => {
                let tx = PendingTransaction::from_order(order, *seqno, hash.clone(), *fees, token_master)?;
                self.add(tx.clone())?;
                Ok(Some(tx))
            }
            BroadcastOutcome::Failure { reason } => {
                warn!(%reason, "Broadcast failed, nothing recorded");
                Ok(None)
            }
        }
    }

    /// Mark an entry as seen on chain and schedule its removal after the
    /// grace window. Must be called from within a Tokio runtime.
    pub fn mark_sent(&self, id: Uuid) -> Result<(), PendingError> {
        let mut found = false;
        let changed = self.inner.entries.send_if_modified(|entries| {
            let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
                return false;
            };
            found = true;
            if entry.status == PendingStatus::Sent {
                return false;
            }
            entry.status = PendingStatus::Sent;
            true
        });
        if !found {
            return Err(PendingError::NotFound(id));
        }
        if !changed {
            debug!(%id, "Pending transaction already sent");
            return Ok(());
        }

        info!(%id, grace_secs = self.inner.grace.as_secs(), "Pending transaction sent");
        let store = self.clone();
        let timer = self.inner.shutdown.child_token();
        self.timers().insert(id, timer.clone());
        let grace = self.inner.grace;
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(grace) => {
                    store.remove(id);
                }
            }
        });
        Ok(())
    }

    /// Drop an entry and its removal timer. Unknown ids are ignored.
    pub fn remove(&self, id: Uuid) {
        let removed = self.inner.entries.send_if_modified(|entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            entries.len() != before
        });
        self.cancel_timers([id]);
        if removed {
            debug!(%id, "Pending transaction removed");
        }
    }

    /// Drop entries the wallet has already processed: any entry whose
    /// seqno is below the wallet's current seqno.
    pub fn reconcile_seqno(&self, current_seqno: u32) -> usize {
        let mut dropped = Vec::new();
        self.inner.entries.send_if_modified(|entries| {
            entries.retain(|e| {
                let keep = e.seqno >= current_seqno;
                if !keep {
                    dropped.push(e.id);
                }
                keep
            });
            !dropped.is_empty()
        });
        let removed = dropped.len();
        self.cancel_timers(dropped);
        if removed > 0 {
            info!(removed, current_seqno, "Reconciled pending transactions");
        }
        removed
    }

    pub fn get(&self, id: Uuid) -> Option<PendingTransaction> {
        self.inner.entries.borrow().iter().find(|e| e.id == id).cloned()
    }

    pub fn snapshot(&self) -> Vec<PendingTransaction> {
        self.inner.entries.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<PendingTransaction>> {
        self.inner.entries.subscribe()
    }

    /// Cancel outstanding removal timers.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.timers().clear();
    }

    /// Number of removal timers still armed.
    pub fn active_timers(&self) -> usize {
        self.timers().len()
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<Uuid, CancellationToken>> {
        self.inner.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cancel_timers(&self, ids: impl IntoIterator<Item = Uuid>) {
        let mut timers = self.timers();
        for id in ids {
            if let Some(timer) = timers.remove(&id) {
                timer.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::order::{
        build_native_order, build_token_order, NativeTransfer, SoftwareOrder, TokenTransfer,
    };

    fn addr(byte: u8) -> Address {
        Address::new(0, [byte; 32])
    }

    fn native_order(comment: Option<&str>) -> Order {
        build_native_order(NativeTransfer {
            target: addr(1),
            bounce: true,
            amount: 2_000_000_000,
            amount_all: false,
            comment: comment.map(str::to_string),
            state_init: None,
        })
        .unwrap()
        .into()
    }

    fn pending(seqno: u32) -> PendingTransaction {
        PendingTransaction::from_order(&native_order(None), seqno, "ab".repeat(32), 5_000_000, None)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn sent_entry_is_removed_after_grace() {
        let store = PendingTransactionStore::new(Duration::from_secs(15));
        let tx = pending(4);
        let id = tx.id;
        store.add(tx).unwrap();
        store.mark_sent(id).unwrap();
        assert_eq!(store.get(id).unwrap().status, PendingStatus::Sent);

        tokio::time::sleep(Duration::from_secs(14)).await;
        assert!(store.get(id).is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.get(id).is_none());
        assert!(store.snapshot().is_empty());
        assert_eq!(store.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn removal_before_grace_is_harmless() {
        let store = PendingTransactionStore::new(Duration::from_secs(15));
        let keep = pending(5);
        let tx = pending(4);
        let id = tx.id;
        store.add(tx).unwrap();
        store.add(keep.clone()).unwrap();
        store.mark_sent(id).unwrap();
        assert_eq!(store.active_timers(), 1);
        store.remove(id);
        store.remove(id);
        assert!(store.get(id).is_none());
        assert_eq!(store.active_timers(), 0);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(store.snapshot(), vec![keep]);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = PendingTransactionStore::default();
        let tx = pending(1);
        store.add(tx.clone()).unwrap();
        assert_eq!(store.add(tx.clone()), Err(PendingError::DuplicateId(tx.id)));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn entries_are_kept_in_insertion_order() {
        let store = PendingTransactionStore::default();
        let (a, b) = (pending(1), pending(2));
        store.add(a.clone()).unwrap();
        store.add(b.clone()).unwrap();
        let ids: Vec<_> = store.snapshot().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn sent_never_moves_back() {
        let store = PendingTransactionStore::new(Duration::from_secs(15));
        let tx = pending(1);
        let id = tx.id;
        store.add(tx).unwrap();
        store.mark_sent(id).unwrap();
        store.mark_sent(id).unwrap();
        assert_eq!(store.get(id).unwrap().status, PendingStatus::Sent);

        let unknown = Uuid::new_v4();
        assert_eq!(store.mark_sent(unknown), Err(PendingError::NotFound(unknown)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_timers() {
        let store = PendingTransactionStore::new(Duration::from_secs(15));
        let tx = pending(1);
        let id = tx.id;
        store.add(tx).unwrap();
        store.mark_sent(id).unwrap();
        store.shutdown();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(store.get(id).is_some());
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let store = PendingTransactionStore::default();
        let mut rx = store.subscribe();
        store.add(pending(1)).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
        store.remove(Uuid::new_v4());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn reconcile_drops_processed_entries() {
        let store = PendingTransactionStore::default();
        store.add(pending(3)).unwrap();
        store.add(pending(4)).unwrap();
        store.add(pending(5)).unwrap();
        assert_eq!(store.reconcile_seqno(5), 2);
        assert_eq!(store.snapshot()[0].seqno, 5);
        assert_eq!(store.reconcile_seqno(5), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_disarms_removal_timers() {
        let store = PendingTransactionStore::new(Duration::from_secs(15));
        let processed = pending(3);
        let waiting = pending(6);
        store.add(processed.clone()).unwrap();
        store.add(waiting.clone()).unwrap();
        store.mark_sent(processed.id).unwrap();
        store.mark_sent(waiting.id).unwrap();
        assert_eq!(store.active_timers(), 2);

        assert_eq!(store.reconcile_seqno(5), 1);
        assert_eq!(store.active_timers(), 1);

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert!(store.snapshot().is_empty());
        assert_eq!(store.active_timers(), 0);
    }

    #[tokio::test]
    async fn failed_broadcast_is_not_recorded() {
        let store = PendingTransactionStore::default();
        let outcome = BroadcastOutcome::Failure {
            reason: "rate limited".into(),
        };
        assert_eq!(store.record_broadcast(&native_order(None), &outcome, None), Ok(None));
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn successful_broadcast_records_comment() {
        let store = PendingTransactionStore::default();
        let outcome = BroadcastOutcome::Success {
            seqno: 9,
            hash: "cd".repeat(32),
            fees: 3_000_000,
        };
        let tx = store
            .record_broadcast(&native_order(Some("coffee")), &outcome, None)
            .unwrap()
            .unwrap();
        assert_eq!(tx.amount, 2_000_000_000);
        assert_eq!(tx.counterparty, Some(addr(1)));
        assert_eq!(tx.body, Some(PendingBody::Comment { text: "coffee".into() }));
        assert_eq!(tx.seqno, 9);
        assert_eq!(tx.status, PendingStatus::Pending);
        assert_eq!(store.snapshot(), vec![tx]);
    }

    #[test]
    fn token_transfer_body_is_recognised() {
        let order: Order = build_token_order(TokenTransfer {
            wallet_address: addr(9),
            target: addr(1),
            response_target: addr(2),
            amount: 750,
            ton_forward_amount: None,
            comment: None,
            query_id: None,
        })
        .unwrap()
        .into();
        let tx = PendingTransaction::from_order(&order, 1, String::new(), 0, Some(addr(7))).unwrap();
        assert_eq!(tx.amount, 750);
        assert_eq!(tx.counterparty, Some(addr(1)));
        assert_eq!(
            tx.body,
            Some(PendingBody::TokenTransfer {
                amount: 750,
                master: addr(7),
                target: addr(1),
            })
        );
    }

    #[test]
    fn batch_orders_list_every_message() {
        let Order::Software(single) = native_order(None) else {
            unreachable!()
        };
        let message = single.messages[0].clone();
        let order: Order = SoftwareOrder::batch(vec![message.clone(), message])
            .unwrap()
            .into();
        let tx = PendingTransaction::from_order(&order, 1, String::new(), 0, None).unwrap();
        assert_eq!(tx.amount, 4_000_000_000);
        assert_eq!(tx.counterparty, None);
        assert!(matches!(tx.body, Some(PendingBody::Batch { ref messages }) if messages.len() == 2));
    }
}
