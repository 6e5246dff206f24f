// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only access to the TON network through the v4 HTTP API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;

use super::address::Address;
use super::boc;
use super::cell::Cell;
use super::fees::{FeeConfig, FeeConfigError};
use super::tuple::{serialize_tuple, TupleItem, TupleReader, WireTupleItem};
use super::types::{Coins, NetworkConfig};

/// Masterchain block the reads are pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub seqno: u32,
    /// Network time (unix seconds) reported with the block.
    pub now: u32,
}

/// Storage accounting of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageStat {
    pub last_paid: u32,
    pub due_payment: Option<Coins>,
    pub used_bits: u64,
    pub used_cells: u64,
    pub used_public_cells: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
    Uninit,
    Active {
        code: Option<Arc<Cell>>,
        data: Option<Arc<Cell>>,
    },
    Frozen,
}

/// Account snapshot at a given block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub balance: Coins,
    pub status: AccountStatus,
    pub storage: Option<StorageStat>,
}

impl AccountState {
    pub fn is_active(&self) -> bool {
        matches!(self.status, AccountStatus::Active { .. })
    }
}

/// Outcome of a get-method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub exit_code: i32,
    pub stack: Vec<TupleItem>,
}

impl RunResult {
    pub fn reader(&self) -> TupleReader {
        TupleReader::new(self.stack.clone())
    }
}

/// Errors that can occur while talking to the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    #[error("cannot encode request: {0}")]
    Encoding(String),

    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    /// Transient failures that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(_) => true,
            ClientError::Status { status, .. } => *status == 429 || *status >= 500,
            ClientError::InvalidResponse(_) | ClientError::Encoding(_) | ClientError::Cancelled => {
                false
            }
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::InvalidResponse(e.to_string())
        } else {
            ClientError::Http(e.to_string())
        }
    }
}

impl From<FeeConfigError> for ClientError {
    fn from(e: FeeConfigError) -> Self {
        ClientError::InvalidResponse(e.to_string())
    }
}

/// Network accessors consumed by the resolver, the fee estimator and the
/// account sync. All calls are idempotent reads.
#[async_trait]
pub trait TonClient: Send + Sync {
    async fn get_last_block(&self) -> Result<BlockRef, ClientError>;

    async fn get_account(
        &self,
        block: BlockRef,
        address: &Address,
    ) -> Result<AccountState, ClientError>;

    async fn run_method(
        &self,
        block: BlockRef,
        address: &Address,
        method: &str,
        args: &[TupleItem],
    ) -> Result<RunResult, ClientError>;

    async fn get_fee_config(&self, block: BlockRef) -> Result<FeeConfig, ClientError>;

    /// Wallet `seqno` get-method. Uninitialized wallets report zero.
    async fn fetch_seqno(&self, block: BlockRef, address: &Address) -> Result<u32, ClientError> {
        let result = self.run_method(block, address, "seqno", &[]).await?;
        if result.exit_code != 0 && result.exit_code != 1 {
            return Ok(0);
        }
        let seqno = result
            .reader()
            .read_int()
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        u32::try_from(seqno).map_err(|_| ClientError::InvalidResponse(format!("seqno {seqno}")))
    }
}

// =============================================================================
// Client4 (v4 HTTP API)
// =============================================================================

#[derive(Deserialize)]
struct LastBlockResponse {
    last: LastBlock,
    now: u32,
}

#[derive(Deserialize)]
struct LastBlock {
    seqno: u32,
}

#[derive(Deserialize)]
struct AccountResponse {
    account: WireAccount,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAccount {
    state: WireAccountState,
    balance: WireBalance,
    storage_stat: Option<WireStorageStat>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireAccountState {
    Uninit,
    Active {
        code: Option<String>,
        data: Option<String>,
    },
    Frozen,
}

#[derive(Deserialize)]
struct WireBalance {
    coins: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStorageStat {
    last_paid: u32,
    due_payment: Option<String>,
    used: WireStorageUsed,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStorageUsed {
    bits: u64,
    cells: u64,
    public_cells: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunMethodResponse {
    exit_code: i32,
    #[serde(default)]
    result: Vec<WireTupleItem>,
}

#[derive(Deserialize)]
struct ConfigResponse {
    config: WireConfig,
}

#[derive(Deserialize)]
struct WireConfig {
    cell: String,
}

fn parse_coins(raw: &str) -> Result<Coins, ClientError> {
    raw.parse()
        .map_err(|_| ClientError::InvalidResponse(format!("invalid coin amount `{raw}`")))
}

fn decode_cell(raw: &str) -> Result<Arc<Cell>, ClientError> {
    boc::from_base64(raw)
        .map(Arc::new)
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

/// Config parameters the fee calculation needs.
const FEE_CONFIG_PARAMS: &str = "18,20,21,24,25";

/// TON HTTP API v4 client.
#[derive(Clone)]
pub struct Client4 {
    http: reqwest::Client,
    endpoint: url::Url,
}

impl Client4 {
    /// Create a client for an explicit endpoint.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ClientError> {
        let endpoint: url::Url = endpoint
            .parse()
            .map_err(|e: url::ParseError| ClientError::Encoding(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Http(e.to_string()))?;
        Ok(Self { http, endpoint })
    }

    /// Create a client for a network's default endpoint.
    pub fn for_network(network: &NetworkConfig, timeout: Duration) -> Result<Self, ClientError> {
        Self::new(network.api_url, timeout)
    }

    fn url(&self, segments: &[&str]) -> Result<url::Url, ClientError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Encoding("endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<T, ClientError> {
        let url = self.url(segments)?;
        tracing::trace!(url = %url, "Client4 request");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TonClient for Client4 {
    async fn get_last_block(&self) -> Result<BlockRef, ClientError> {
        let response: LastBlockResponse = self.get_json(&["block", "latest"]).await?;
        Ok(BlockRef {
            seqno: response.last.seqno,
            now: response.now,
        })
    }

    async fn get_account(
        &self,
        block: BlockRef,
        address: &Address,
    ) -> Result<AccountState, ClientError> {
        let seqno = block.seqno.to_string();
        let address = address.to_string();
        let response: AccountResponse = self
            .get_json(&["block", seqno.as_str(), address.as_str()])
            .await?;
        let account = response.account;

        let status = match account.state {
            WireAccountState::Uninit => AccountStatus::Uninit,
            WireAccountState::Frozen => AccountStatus::Frozen,
            WireAccountState::Active { code, data } => AccountStatus::Active {
                code: code.as_deref().map(decode_cell).transpose()?,
                data: data.as_deref().map(decode_cell).transpose()?,
            },
        };
        let storage = account
            .storage_stat
            .map(|s| -> Result<StorageStat, ClientError> {
                Ok(StorageStat {
                    last_paid: s.last_paid,
                    due_payment: s.due_payment.as_deref().map(parse_coins).transpose()?,
                    used_bits: s.used.bits,
                    used_cells: s.used.cells,
                    used_public_cells: s.used.public_cells,
                })
            })
            .transpose()?;

        Ok(AccountState {
            balance: parse_coins(&account.balance.coins)?,
            status,
            storage,
        })
    }

    async fn run_method(
        &self,
        block: BlockRef,
        address: &Address,
        method: &str,
        args: &[TupleItem],
    ) -> Result<RunResult, ClientError> {
        let seqno = block.seqno.to_string();
        let address = address.to_string();
        let mut segments = vec!["block", seqno.as_str(), address.as_str(), "run", method];
        let encoded_args;
        if !args.is_empty() {
            let stack =
                serialize_tuple(args).map_err(|e| ClientError::Encoding(e.to_string()))?;
            encoded_args = Base64UrlUnpadded::encode_string(&boc::serialize(&stack));
            segments.push(encoded_args.as_str());
        }

        let response: RunMethodResponse = self.get_json(&segments).await?;
        let stack = response
            .result
            .into_iter()
            .map(TupleItem::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        Ok(RunResult {
            exit_code: response.exit_code,
            stack,
        })
    }

    async fn get_fee_config(&self, block: BlockRef) -> Result<FeeConfig, ClientError> {
        let seqno = block.seqno.to_string();
        let response: ConfigResponse = self
            .get_json(&["block", seqno.as_str(), "config", FEE_CONFIG_PARAMS])
            .await?;
        let root: Cell = boc::from_base64(&response.config.cell)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        Ok(FeeConfig::from_config_root(&root)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(ClientError::Http("reset".into()).is_retryable());
        assert!(ClientError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(ClientError::Status {
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(!ClientError::Status {
            status: 404,
            body: String::new()
        }
        .is_retryable());
        assert!(!ClientError::InvalidResponse("x".into()).is_retryable());
        assert!(!ClientError::Cancelled.is_retryable());
    }

    #[test]
    fn url_segments_are_appended_to_endpoint() {
        let client = Client4::new("https://mainnet-v4.tonhubapi.com", Duration::from_secs(5))
            .unwrap();
        let url = client.url(&["block", "latest"]).unwrap();
        assert_eq!(url.as_str(), "https://mainnet-v4.tonhubapi.com/block/latest");
    }

    #[test]
    fn account_response_parses() {
        let raw = r#"{
            "account": {
                "state": {"type": "uninit"},
                "balance": {"coins": "1000000000"},
                "last": null,
                "storageStat": {
                    "lastPaid": 1700000000,
                    "duePayment": null,
                    "used": {"bits": 1200, "cells": 3, "publicCells": 0}
                }
            },
            "block": {}
        }"#;
        let parsed: AccountResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(parsed.account.state, WireAccountState::Uninit));
        assert_eq!(parsed.account.balance.coins, "1000000000");
        let stat = parsed.account.storage_stat.unwrap();
        assert_eq!(stat.used.bits, 1200);
        assert_eq!(stat.last_paid, 1_700_000_000);
    }

    #[test]
    fn run_response_parses() {
        let raw = r#"{"exitCode": 0, "result": [{"type": "int", "value": "5"}], "resultRaw": null}"#;
        let parsed: RunMethodResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.exit_code, 0);
        assert_eq!(parsed.result.len(), 1);
    }
}
