// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Account Sync
//!
//! Background task that keeps the service's view of the network fresh.
//!
//! ## Strategy
//!
//! Every `poll_interval` (default 5 s) the poller:
//! 1. Reads the last masterchain block.
//! 2. If a wallet is configured, reads its seqno and drops pending entries
//!    the wallet has already processed (`seqno` below the current one).
//! 3. Refreshes the cached fee configuration used by fee estimates.
//!
//! A failed step is logged and retried on the next sweep.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blockchain::retry::{retry_with_backoff, RetryConfig};
use crate::blockchain::{Address, ClientError, FeeConfig, TonClient};
use crate::storage::PendingTransactionStore;

/// Default interval between polling sweeps.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Latest fee configuration read from the network, shared with sessions.
pub type FeeConfigCache = watch::Sender<Option<Arc<FeeConfig>>>;

pub struct AccountSync {
    client: Arc<dyn TonClient>,
    store: PendingTransactionStore,
    fee_config: Arc<FeeConfigCache>,
    wallet: Option<Address>,
    poll_interval: Duration,
    retry: RetryConfig,
}

impl AccountSync {
    pub fn new(
        client: Arc<dyn TonClient>,
        store: PendingTransactionStore,
        fee_config: Arc<FeeConfigCache>,
        wallet: Option<Address>,
    ) -> Self {
        Self {
            client,
            store,
            fee_config,
            wallet,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run the poller loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sync.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            wallet = ?self.wallet.map(|w| w.to_string()),
            "Account sync starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = self.poll_step(&shutdown).await {
                if e == ClientError::Cancelled {
                    break;
                }
                warn!(error = %e, "Account sync: sweep failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => break,
            }
        }
        info!("Account sync shutting down");
    }

    /// One sweep: reconcile pending entries and refresh the fee config.
    pub async fn poll_step(&self, shutdown: &CancellationToken) -> Result<(), ClientError> {
        let client = &self.client;
        let block =
            retry_with_backoff(&self.retry, shutdown, "get_last_block", || client.get_last_block())
                .await?;

        if let Some(wallet) = self.wallet {
            let seqno = retry_with_backoff(&self.retry, shutdown, "fetch_seqno", || {
                client.fetch_seqno(block, &wallet)
            })
            .await?;
            let removed = self.store.reconcile_seqno(seqno);
            debug!(seqno, removed, "Account sync: wallet seqno");
        }

        let config = retry_with_backoff(&self.retry, shutdown, "get_fee_config", || {
            client.get_fee_config(block)
        })
        .await?;
        self.fee_config.send_replace(Some(Arc::new(config)));
        Ok(())
    }
}
