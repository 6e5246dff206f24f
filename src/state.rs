// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use uuid::Uuid;

use crate::blockchain::{FeeConfig, Network, TonClient};
use crate::config::ServiceConfig;
use crate::storage::{PendingTransactionStore, SessionRegistry};
use crate::sync::FeeConfigCache;
use crate::transfer::{SessionSettings, TransferSession};

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn TonClient>,
    pub sessions: Arc<SessionRegistry>,
    pub pending: PendingTransactionStore,
    /// Filled by the account sync; estimates fetch their own config while empty.
    pub fee_config: Arc<FeeConfigCache>,
    pub settings: SessionSettings,
    pub network: Network,
}

impl AppState {
    pub fn new(client: Arc<dyn TonClient>, config: &ServiceConfig) -> Self {
        Self {
            client,
            sessions: Arc::new(SessionRegistry::new(config.max_sessions, config.session_idle)),
            pending: PendingTransactionStore::new(config.pending_grace),
            fee_config: Arc::new(FeeConfigCache::new(None)),
            settings: SessionSettings {
                dns_root: config.dns_root,
                retry: config.retry.clone(),
                debounce: config.fee_debounce,
            },
            network: config.network,
        }
    }

    pub fn session(&self, id: Uuid) -> Option<Arc<TransferSession>> {
        self.sessions.get(id)
    }

    pub fn cached_fee_config(&self) -> Option<Arc<FeeConfig>> {
        self.fee_config.borrow().clone()
    }

    pub fn is_testnet(&self) -> bool {
        self.network.is_testnet()
    }
}
