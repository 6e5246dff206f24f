// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! A transfer session ties the resolver and the fee estimator to one
//! open transfer form and turns the user's input into an order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::blockchain::retry::RetryConfig;
use crate::blockchain::wallet::StateInit;
use crate::blockchain::{Address, Coins, TonClient, TON_DECIMALS};

use super::amount::parse_amount;
use super::error::TransferError;
use super::fee::FeeEstimator;
use super::order::{
    build_ledger_native_order, build_ledger_token_order, build_native_order, build_token_order,
    NativeTransfer, Order, TokenTransfer,
};
use super::resolver::{AddressResolver, ResolvedTarget};
use super::validation::{validate_native, validate_token, Balances};

/// Who signs the resulting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SignerKind {
    #[default]
    Software,
    Ledger,
}

/// Token side of a transfer intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIntent {
    /// The sender's jetton wallet.
    pub wallet_address: Address,
    pub decimals: u8,
    pub balance: Coins,
    /// Where excess TON is returned; the sender's main wallet.
    pub response_target: Address,
    /// Optional forward amount in TON, as typed.
    pub ton_forward_amount: Option<String>,
    pub query_id: Option<u64>,
}

/// Raw form state of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferIntent {
    pub signer: SignerKind,
    pub target: String,
    /// Literal address used when `target` is a domain that cannot be resolved.
    pub fallback_address: Option<String>,
    pub amount: String,
    pub amount_all: bool,
    pub comment: Option<String>,
    pub token: Option<TokenIntent>,
    pub ton_balance: Coins,
    pub state_init: Option<StateInit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransfer {
    pub order: Order,
    pub order_hash: String,
    pub target: ResolvedTarget,
}

/// Settings shared by every session of the service.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub dns_root: Address,
    pub retry: RetryConfig,
    pub debounce: Duration,
}

pub struct TransferSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    resolver: AddressResolver,
    estimator: FeeEstimator,
}

impl TransferSession {
    pub fn new(client: Arc<dyn TonClient>, settings: &SessionSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            resolver: AddressResolver::new(client.clone(), settings.dns_root),
            estimator: FeeEstimator::new(client, settings.retry.clone(), settings.debounce),
        }
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    pub fn estimator(&self) -> &FeeEstimator {
        &self.estimator
    }

    /// Teardown: cancel in-flight estimation and drop resolution results.
    pub fn close(&self) {
        self.estimator.cancel();
        self.resolver.clear();
        info!(session_id = %self.id, "Transfer session closed");
    }

    /// Resolve, parse, validate and build the order for `intent`.
    pub async fn prepare(&self, intent: TransferIntent) -> Result<PreparedTransfer, TransferError> {
        let target = self.resolve_target(&intent).await?;

        let order: Order = match &intent.token {
            None => {
                let amount = if intent.amount_all {
                    0
                } else {
                    parse_amount(&intent.amount, TON_DECIMALS)?
                };
                validate_native(amount, intent.amount_all, intent.ton_balance)?;
                let transfer = NativeTransfer {
                    target: target.canonical_address,
                    bounce: target.bounceable,
                    amount,
                    amount_all: intent.amount_all,
                    comment: intent.comment.clone(),
                    state_init: intent.state_init.clone(),
                };
                match intent.signer {
                    SignerKind::Software => build_native_order(transfer)?.into(),
                    SignerKind::Ledger => build_ledger_native_order(transfer).into(),
                }
            }
            Some(token) => {
                let amount = if intent.amount_all {
                    token.balance
                } else {
                    parse_amount(&intent.amount, token.decimals)?
                };
                let ton_forward_amount = token
                    .ton_forward_amount
                    .as_deref()
                    .filter(|raw| !raw.trim().is_empty())
                    .map(|raw| parse_amount(raw, TON_DECIMALS))
                    .transpose()?;
                let transfer = TokenTransfer {
                    wallet_address: token.wallet_address,
                    target: target.canonical_address,
                    response_target: token.response_target,
                    amount,
                    ton_forward_amount,
                    comment: intent.comment.clone(),
                    query_id: token.query_id,
                };
                validate_token(
                    &transfer,
                    Balances {
                        ton: intent.ton_balance,
                        token: Some(token.balance),
                    },
                )?;
                match intent.signer {
                    SignerKind::Software => build_token_order(transfer)?.into(),
                    SignerKind::Ledger => build_ledger_token_order(transfer)?.into(),
                }
            }
        };

        let order_hash = order.hash()?;
        debug!(session_id = %self.id, order_hash = %order_hash, "Order prepared");
        Ok(PreparedTransfer {
            order,
            order_hash,
            target,
        })
    }

    async fn resolve_target(&self, intent: &TransferIntent) -> Result<ResolvedTarget, TransferError> {
        match self.resolver.lookup(&intent.target).await {
            Ok(target) => Ok(target),
            Err(e @ (TransferError::DomainInvalid(_) | TransferError::DomainNotFound(_))) => {
                let Some(fallback) = intent.fallback_address.as_deref() else {
                    return Err(e);
                };
                debug!(session_id = %self.id, error = %e, "Using fallback address");
                AddressResolver::try_literal(fallback)
                    .ok_or_else(|| TransferError::InvalidAddress(fallback.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}
