// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive
//! `Serialize`/`Deserialize` and `ToSchema` for JSON handling and OpenAPI
//! documentation.
//!
//! ## Conventions
//!
//! - Addresses travel as strings: raw (`0:<hex>`) or user-friendly base64.
//! - Amounts travel as decimal strings of base units (nanotons for TON),
//!   never as JSON numbers.
//! - Orders, state inits and broadcast outcomes are passed through in their
//!   domain serialization and documented as opaque objects.
//!
//! ## Model Categories
//!
//! - **Sessions**: Transfer session lifecycle and target resolution
//! - **Orders**: Transfer intents and the orders built from them
//! - **Fees**: Fee estimation requests and quotes
//! - **Pending**: Broadcast transfers awaiting confirmation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::blockchain::wallet::StateInit;
use crate::blockchain::{Address, Coins, TON_DECIMALS};
use crate::error::ApiError;
use crate::storage::{BroadcastOutcome, PendingBody, PendingStatus, PendingTransaction};
use crate::transfer::{
    format_amount, FeeQuote, Order, PreparedTransfer, ResolvedTarget, SignerKind, TokenIntent,
    TransferIntent, WalletSnapshot,
};

fn parse_address(field: &str, raw: &str) -> Result<Address, ApiError> {
    Address::parse(raw.trim()).map_err(|e| ApiError::bad_request(format!("{field}: {e}")))
}

fn parse_coins(field: &str, raw: &str) -> Result<Coins, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("{field}: expected a decimal amount of base units")))
}

// =============================================================================
// Session Models
// =============================================================================

/// A freshly opened transfer session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSessionResponse {
    /// Identifier used by every other session endpoint.
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Request to resolve what the user typed in the recipient field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResolveRequest {
    /// Raw or friendly address, or a `.ton` / `.t.me` domain.
    pub input: String,
}

/// A resolved recipient.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ResolvedTargetResponse {
    /// The input exactly as submitted.
    pub raw_input: String,
    /// Canonical raw form (`workchain:hex`).
    pub address: String,
    /// User-friendly form with the resolved bounce flag.
    pub friendly_address: String,
    pub bounceable: bool,
    pub resolved_from_domain: bool,
    /// Normalized domain, when the input was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl ResolvedTargetResponse {
    pub fn new(target: ResolvedTarget, testnet: bool) -> Self {
        Self {
            address: target.canonical_address.to_raw(),
            friendly_address: target
                .canonical_address
                .to_friendly(target.bounceable, testnet, true),
            raw_input: target.raw_input,
            bounceable: target.bounceable,
            resolved_from_domain: target.resolved_from_domain,
            domain: target.domain,
        }
    }
}

/// Result of a resolve call.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResolveResponse {
    /// `null` when the input was cleared.
    pub target: Option<ResolvedTargetResponse>,
}

// =============================================================================
// Order Models
// =============================================================================

/// Token side of a transfer request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenIntentRequest {
    /// The sender's jetton wallet.
    pub wallet_address: String,
    /// Decimals of the jetton.
    pub decimals: u8,
    /// Jetton balance in base units.
    pub balance: String,
    /// Where excess TON is returned; normally the sender's main wallet.
    pub response_target: String,
    /// Optional TON forwarded to the recipient, as typed (e.g. `"0.05"`).
    #[serde(default)]
    pub ton_forward_amount: Option<String>,
    #[serde(default)]
    pub query_id: Option<u64>,
}

impl TryFrom<TokenIntentRequest> for TokenIntent {
    type Error = ApiError;

    fn try_from(req: TokenIntentRequest) -> Result<Self, Self::Error> {
        Ok(TokenIntent {
            wallet_address: parse_address("token.wallet_address", &req.wallet_address)?,
            decimals: req.decimals,
            balance: parse_coins("token.balance", &req.balance)?,
            response_target: parse_address("token.response_target", &req.response_target)?,
            ton_forward_amount: req.ton_forward_amount,
            query_id: req.query_id,
        })
    }
}

/// The transfer form as the user filled it in.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferIntentRequest {
    /// Who signs the order (`software` or `ledger`).
    #[serde(default)]
    pub signer: SignerKind,
    /// Recipient address or domain.
    pub target: String,
    /// Literal address used when `target` is a domain that cannot be resolved.
    #[serde(default)]
    pub fallback_address: Option<String>,
    /// Amount as typed, in whole units (e.g. `"1.5"`). Ignored when `amount_all`.
    #[serde(default)]
    pub amount: String,
    /// Send the whole balance.
    #[serde(default)]
    pub amount_all: bool,
    #[serde(default)]
    pub comment: Option<String>,
    /// Present for jetton transfers.
    #[serde(default)]
    pub token: Option<TokenIntentRequest>,
    /// TON balance of the sending wallet, in nanotons.
    pub ton_balance: String,
    /// State init deployed alongside a native transfer.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub state_init: Option<StateInit>,
}

impl TryFrom<TransferIntentRequest> for TransferIntent {
    type Error = ApiError;

    fn try_from(req: TransferIntentRequest) -> Result<Self, Self::Error> {
        Ok(TransferIntent {
            signer: req.signer,
            target: req.target,
            fallback_address: req.fallback_address,
            amount: req.amount,
            amount_all: req.amount_all,
            comment: req.comment,
            token: req.token.map(TokenIntent::try_from).transpose()?,
            ton_balance: parse_coins("ton_balance", &req.ton_balance)?,
            state_init: req.state_init,
        })
    }
}

/// An order ready for signing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    /// The order, tagged by signer kind.
    #[schema(value_type = Object)]
    pub order: Order,
    /// Hex SHA-256 identifying the order; fee quotes refer to it.
    pub order_hash: String,
    pub target: ResolvedTargetResponse,
    pub message_count: usize,
    /// Total TON attached, in nanotons.
    pub total_value: String,
    /// Whether the order sweeps the whole balance.
    pub sends_all: bool,
}

impl OrderResponse {
    pub fn new(prepared: PreparedTransfer, testnet: bool) -> Self {
        Self {
            message_count: prepared.order.message_count(),
            total_value: prepared.order.total_value().to_string(),
            sends_all: prepared.order.sends_all(),
            order_hash: prepared.order_hash,
            target: ResolvedTargetResponse::new(prepared.target, testnet),
            order: prepared.order,
        }
    }
}

// =============================================================================
// Fee Models
// =============================================================================

/// Request to price an order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EstimateRequest {
    #[schema(value_type = Object)]
    pub order: Order,
    /// The sending wallet.
    #[schema(value_type = Object)]
    pub wallet: WalletSnapshot,
}

/// A computed fee.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct FeeQuoteResponse {
    /// Fee in nanotons.
    pub amount: String,
    /// Fee in TON, for display.
    pub formatted: String,
    pub computed_at: DateTime<Utc>,
    pub order_hash: String,
}

impl From<FeeQuote> for FeeQuoteResponse {
    fn from(quote: FeeQuote) -> Self {
        Self {
            amount: quote.amount.to_string(),
            formatted: format_amount(quote.amount, TON_DECIMALS),
            computed_at: quote.computed_at,
            order_hash: quote.order_hash,
        }
    }
}

/// Result of an estimate call.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EstimateResponse {
    /// `null` when the estimate was superseded, cancelled or failed.
    pub fee: Option<FeeQuoteResponse>,
}

// =============================================================================
// Pending Transaction Models
// =============================================================================

/// A broadcast transfer not yet confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PendingTransactionResponse {
    pub id: Uuid,
    /// Amount in nanotons.
    pub amount: String,
    /// Recipient in raw form; absent for batches.
    pub counterparty: Option<String>,
    /// What the transfer carried.
    #[schema(value_type = Option<Object>)]
    pub body: Option<PendingBody>,
    /// Fees paid, in nanotons.
    pub fees: String,
    pub seqno: u32,
    /// Hex hash of the external message.
    pub hash: String,
    pub created_at: DateTime<Utc>,
    /// `pending` or `sent`.
    #[schema(value_type = String)]
    pub status: PendingStatus,
}

impl From<PendingTransaction> for PendingTransactionResponse {
    fn from(tx: PendingTransaction) -> Self {
        Self {
            id: tx.id,
            amount: tx.amount.to_string(),
            counterparty: tx.counterparty.map(|a| a.to_raw()),
            body: tx.body,
            fees: tx.fees.to_string(),
            seqno: tx.seqno,
            hash: tx.hash,
            created_at: tx.created_at,
            status: tx.status,
        }
    }
}

/// Report of a broadcast attempt.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordBroadcastRequest {
    /// The order that was signed and sent.
    #[schema(value_type = Object)]
    pub order: Order,
    /// `{"status": "success", seqno, hash, fees}` or `{"status": "failure", reason}`.
    #[schema(value_type = Object)]
    pub outcome: BroadcastOutcome,
    /// Jetton master, for token transfers.
    #[serde(default)]
    pub token_master: Option<String>,
}

/// Result of recording a broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordBroadcastResponse {
    /// The new entry; `null` when the broadcast failed.
    pub transaction: Option<PendingTransactionResponse>,
}

/// Helper for handlers receiving an optional address string.
pub fn parse_optional_address(field: &str, raw: Option<&str>) -> Result<Option<Address>, ApiError> {
    raw.filter(|r| !r.trim().is_empty())
        .map(|r| parse_address(field, r))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn intent_request_converts_with_defaults() {
        let req: TransferIntentRequest = serde_json::from_value(json!({
            "target": "example.ton",
            "amount": "1.5",
            "ton_balance": "10000000000"
        }))
        .unwrap();
        let intent = TransferIntent::try_from(req).unwrap();
        assert_eq!(intent.signer, SignerKind::Software);
        assert_eq!(intent.ton_balance, 10_000_000_000);
        assert!(!intent.amount_all);
        assert!(intent.token.is_none());
    }

    #[test]
    fn malformed_balance_is_bad_request() {
        let req: TransferIntentRequest = serde_json::from_value(json!({
            "target": "example.ton",
            "amount": "1",
            "ton_balance": "ten"
        }))
        .unwrap();
        let err = TransferIntent::try_from(req).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.starts_with("ton_balance"));
    }

    #[test]
    fn token_request_requires_valid_addresses() {
        let req = TokenIntentRequest {
            wallet_address: "nope".to_string(),
            decimals: 6,
            balance: "100".to_string(),
            response_target: Address::new(0, [1; 32]).to_raw(),
            ton_forward_amount: None,
            query_id: None,
        };
        let err = TokenIntent::try_from(req).unwrap_err();
        assert!(err.message.starts_with("token.wallet_address"));
    }

    #[test]
    fn fee_quote_is_formatted_in_ton() {
        let response = FeeQuoteResponse::from(FeeQuote {
            amount: 5_500_000,
            computed_at: Utc::now(),
            order_hash: "ab".to_string(),
        });
        assert_eq!(response.amount, "5500000");
        assert_eq!(response.formatted, "0.0055");
    }

    #[test]
    fn blank_optional_address_is_none() {
        assert_eq!(parse_optional_address("token_master", Some("  ")).unwrap(), None);
        assert!(parse_optional_address("token_master", Some("0:zz")).is_err());
    }
}
