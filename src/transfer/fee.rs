// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Debounced, cancellable fee estimation.
//!
//! Each transfer session owns one [`FeeEstimator`]. Every call to
//! [`FeeEstimator::estimate`] supersedes the previous one: the older request
//! is cancelled (its debounce or backoff sleep ends early, an in-flight read
//! completes but is ignored) and only the newest request may store a quote.
//!
//! ## Flow
//!
//! 1. Wait out the debounce window.
//! 2. Take the session lock so at most one computation runs.
//! 3. Read the last block, the wallet seqno and the wallet account, each
//!    with retry/backoff.
//! 4. Build the wallet request with a zero signature and price it with the
//!    network's fee configuration.
//! 5. Store the quote if this request is still the latest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blockchain::fees::{estimate_transfer_fee, ForwardedMessage, TransferFeeInputs};
use crate::blockchain::retry::{retry_with_backoff, RetryConfig};
use crate::blockchain::types::coins_string;
use crate::blockchain::wallet::{valid_until, OutgoingMessage, StateInit, WalletV4};
use crate::blockchain::{Address, Cell, Coins, FeeConfig, TonClient};

use super::error::TransferError;
use super::order::Order;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// The sending wallet, as far as fee estimation needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub address: Address,
    /// Subwallet id; the v4 default for the workchain when absent.
    #[serde(default)]
    pub wallet_id: Option<u32>,
    /// Deployment state, attached while the wallet is not yet deployed.
    #[serde(default)]
    pub state_init: Option<StateInit>,
}

impl WalletSnapshot {
    fn wallet(&self) -> WalletV4 {
        let mut wallet = WalletV4::new(self.address);
        if let Some(id) = self.wallet_id {
            wallet.wallet_id = id;
        }
        wallet
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    #[serde(with = "coins_string")]
    pub amount: Coins,
    pub computed_at: DateTime<Utc>,
    pub order_hash: String,
}

pub struct FeeEstimator {
    client: Arc<dyn TonClient>,
    retry: RetryConfig,
    debounce: Duration,
    /// Held for the whole computation.
    lock: Mutex<()>,
    generation: AtomicU64,
    active: StdMutex<CancellationToken>,
    quote: watch::Sender<Option<FeeQuote>>,
}

impl FeeEstimator {
    pub fn new(client: Arc<dyn TonClient>, retry: RetryConfig, debounce: Duration) -> Self {
        Self {
            client,
            retry,
            debounce,
            lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            active: StdMutex::new(CancellationToken::new()),
            quote: watch::Sender::new(None),
        }
    }

    /// Estimate the fee of `order` sent from `wallet`.
    ///
    /// Returns `None` when the request was superseded or cancelled, or when
    /// the estimate failed; failures are logged and the fee stays unknown.
    /// `fee_config` is fetched from the network when not supplied.
    pub async fn estimate(
        &self,
        order: &Order,
        wallet: &WalletSnapshot,
        fee_config: Option<Arc<FeeConfig>>,
    ) -> Option<FeeQuote> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = self.replace_token();

        let order_hash = match order.hash() {
            Ok(hash) => hash,
            Err(e) => {
                warn!(error = %e, "Cannot hash order for fee estimate");
                return None;
            }
        };

        tokio::select! {
            _ = token.cancelled() => {
                debug!(generation, "Fee estimate superseded during debounce");
                return None;
            }
            _ = tokio::time::sleep(self.debounce) => {}
        }

        let _guard = tokio::select! {
            _ = token.cancelled() => {
                debug!(generation, "Fee estimate superseded while waiting for lock");
                return None;
            }
            guard = self.lock.lock() => guard,
        };

        let result = self.compute(order, wallet, fee_config, &token).await;

        if !self.is_current(generation, &token) {
            debug!(generation, "Discarding superseded fee estimate");
            return None;
        }
        match result {
            Ok(amount) => {
                let quote = FeeQuote {
                    amount,
                    computed_at: Utc::now(),
                    order_hash,
                };
                let stored = self.quote.send_if_modified(|slot| {
                    if !self.is_current(generation, &token) {
                        return false;
                    }
                    *slot = Some(quote.clone());
                    true
                });
                if !stored {
                    return None;
                }
                info!(generation, fee = %amount, order_hash = %quote.order_hash, "Fee estimated");
                Some(quote)
            }
            Err(e) => {
                warn!(generation, error = %e, "Fee estimate failed");
                None
            }
        }
    }

    /// Cancel whatever is in flight. The estimator stays usable.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.active_token().cancel();
    }

    /// Last stored quote.
    pub fn quote(&self) -> Option<FeeQuote> {
        self.quote.borrow().clone()
    }

    /// Last stored quote, only if it was computed for the order with `order_hash`.
    pub fn quote_for(&self, order_hash: &str) -> Option<FeeQuote> {
        self.quote().filter(|q| q.order_hash == order_hash)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<FeeQuote>> {
        self.quote.subscribe()
    }

    /// No computation holds the session lock.
    pub fn is_idle(&self) -> bool {
        self.lock.try_lock().is_ok()
    }

    fn is_current(&self, generation: u64, token: &CancellationToken) -> bool {
        !token.is_cancelled() && self.generation.load(Ordering::SeqCst) == generation
    }

    fn active_token(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cancel the previous request's token and install a fresh one.
    fn replace_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = std::mem::replace(&mut *self.active_token(), token.clone());
        previous.cancel();
        token
    }

    async fn compute(
        &self,
        order: &Order,
        wallet: &WalletSnapshot,
        fee_config: Option<Arc<FeeConfig>>,
        token: &CancellationToken,
    ) -> Result<Coins, TransferError> {
        let client = &self.client;
        let address = wallet.address;

        let block = retry_with_backoff(&self.retry, token, "get_last_block", || {
            client.get_last_block()
        })
        .await?;
        let seqno = retry_with_backoff(&self.retry, token, "fetch_seqno", || {
            client.fetch_seqno(block, &address)
        })
        .await?;
        let account = retry_with_backoff(&self.retry, token, "get_account", || {
            client.get_account(block, &address)
        })
        .await?;
        let config = match fee_config {
            Some(config) => config,
            None => Arc::new(
                retry_with_backoff(&self.retry, token, "get_fee_config", || {
                    client.get_fee_config(block)
                })
                .await?,
            ),
        };

        let prepared = order.prepared_messages()?;
        let outgoing = prepared
            .iter()
            .map(|m| m.outgoing())
            .collect::<Result<Vec<OutgoingMessage>, _>>()?;
        let state_init = if seqno == 0 {
            wallet.state_init.as_ref()
        } else {
            None
        };
        let external = wallet.wallet().unsigned_external(
            seqno,
            valid_until(seqno, block.now),
            &outgoing,
            state_init,
        )?;

        let init_cells = prepared
            .iter()
            .map(|m| m.state_init.as_ref().map(StateInit::to_cell).transpose())
            .collect::<Result<Vec<_>, _>>()?;
        let empty = Cell::empty();
        let forwarded: Vec<ForwardedMessage<'_>> = prepared
            .iter()
            .zip(&init_cells)
            .map(|(m, init)| ForwardedMessage {
                state_init: init.as_ref(),
                body: m.body.as_ref().unwrap_or(&empty),
            })
            .collect();

        Ok(estimate_transfer_fee(
            &config,
            TransferFeeInputs {
                now: block.now,
                masterchain: address.workchain == -1,
                storage: account.storage.as_ref(),
                external_message: &external,
                out_messages: &forwarded,
            },
        ))
    }
}
