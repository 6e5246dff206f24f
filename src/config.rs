// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TON_NETWORK` | `main` or `test` | `main` |
//! | `TON_API_ENDPOINT` | v4 HTTP API base URL | per network |
//! | `DNS_ROOT_ADDRESS` | Root DNS resolver contract | per network |
//! | `PENDING_GRACE_SECS` | Seconds a sent entry stays in the pending list | `15` |
//! | `FEE_DEBOUNCE_MS` | Debounce window of fee estimates | `100` |
//! | `RPC_MAX_RETRIES` | Retries of a failed network read | `3` |
//! | `RPC_BASE_DELAY_MS` | First backoff delay | `100` |
//! | `RPC_MAX_DELAY_MS` | Backoff delay cap | `5000` |
//! | `RPC_TIMEOUT_SECS` | Per-request HTTP timeout | `10` |
//! | `SYNC_WALLET_ADDRESS` | Wallet whose seqno reconciles pending entries | Optional |
//! | `SYNC_INTERVAL_SECS` | Account sync poll interval | `5` |
//! | `MAX_SESSIONS` | Open transfer sessions kept before the least recent is closed | `10000` |
//! | `SESSION_IDLE_SECS` | Seconds an unused session stays open | `1800` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::blockchain::retry::RetryConfig;
use crate::blockchain::{Address, Network};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TON_NETWORK_ENV: &str = "TON_NETWORK";
pub const TON_API_ENDPOINT_ENV: &str = "TON_API_ENDPOINT";
pub const DNS_ROOT_ADDRESS_ENV: &str = "DNS_ROOT_ADDRESS";
pub const PENDING_GRACE_SECS_ENV: &str = "PENDING_GRACE_SECS";
pub const FEE_DEBOUNCE_MS_ENV: &str = "FEE_DEBOUNCE_MS";
pub const RPC_MAX_RETRIES_ENV: &str = "RPC_MAX_RETRIES";
pub const RPC_BASE_DELAY_MS_ENV: &str = "RPC_BASE_DELAY_MS";
pub const RPC_MAX_DELAY_MS_ENV: &str = "RPC_MAX_DELAY_MS";
pub const RPC_TIMEOUT_SECS_ENV: &str = "RPC_TIMEOUT_SECS";
pub const SYNC_WALLET_ADDRESS_ENV: &str = "SYNC_WALLET_ADDRESS";
pub const SYNC_INTERVAL_SECS_ENV: &str = "SYNC_INTERVAL_SECS";
pub const MAX_SESSIONS_ENV: &str = "MAX_SESSIONS";
pub const SESSION_IDLE_SECS_ENV: &str = "SESSION_IDLE_SECS";

/// Logging format selector; read directly by `main` before anything else.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACE_SECS: u64 = 15;
const DEFAULT_DEBOUNCE_MS: u64 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 5;
const DEFAULT_MAX_SESSIONS: usize = 10_000;
const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

/// Service configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub network: Network,
    pub api_endpoint: String,
    pub dns_root: Address,
    pub pending_grace: Duration,
    pub fee_debounce: Duration,
    pub retry: RetryConfig,
    pub rpc_timeout: Duration,
    pub sync_wallet: Option<Address>,
    pub sync_interval: Duration,
    pub max_sessions: usize,
    pub session_idle: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = parse_or(&get, PORT_ENV, DEFAULT_PORT)?;
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e| invalid(HOST_ENV, e))?;

        let network = match get(TON_NETWORK_ENV) {
            Some(raw) => Network::parse(&raw).map_err(|e| invalid(TON_NETWORK_ENV, e))?,
            None => Network::Main,
        };
        let defaults = network.config();

        let api_endpoint = get(TON_API_ENDPOINT_ENV).unwrap_or_else(|| defaults.api_url.to_string());
        url::Url::parse(&api_endpoint).map_err(|e| invalid(TON_API_ENDPOINT_ENV, e))?;

        let dns_root = get(DNS_ROOT_ADDRESS_ENV).unwrap_or_else(|| defaults.dns_root.to_string());
        let dns_root = Address::parse(&dns_root).map_err(|e| invalid(DNS_ROOT_ADDRESS_ENV, e))?;

        let sync_wallet = get(SYNC_WALLET_ADDRESS_ENV)
            .map(|raw| Address::parse(&raw))
            .transpose()
            .map_err(|e| invalid(SYNC_WALLET_ADDRESS_ENV, e))?;

        let retry = RetryConfig::builder()
            .max_retries(parse_or(&get, RPC_MAX_RETRIES_ENV, RetryConfig::default().max_retries)?)
            .base_delay(Duration::from_millis(parse_or(
                &get,
                RPC_BASE_DELAY_MS_ENV,
                crate::blockchain::retry::DEFAULT_BASE_DELAY_MS,
            )?))
            .max_delay(Duration::from_millis(parse_or(
                &get,
                RPC_MAX_DELAY_MS_ENV,
                crate::blockchain::retry::DEFAULT_MAX_DELAY_MS,
            )?))
            .build();

        Ok(Self {
            bind_addr,
            network,
            api_endpoint,
            dns_root,
            pending_grace: Duration::from_secs(parse_or(&get, PENDING_GRACE_SECS_ENV, DEFAULT_GRACE_SECS)?),
            fee_debounce: Duration::from_millis(parse_or(&get, FEE_DEBOUNCE_MS_ENV, DEFAULT_DEBOUNCE_MS)?),
            retry,
            rpc_timeout: Duration::from_secs(parse_or(&get, RPC_TIMEOUT_SECS_ENV, DEFAULT_TIMEOUT_SECS)?),
            sync_wallet,
            sync_interval: Duration::from_secs(parse_or(
                &get,
                SYNC_INTERVAL_SECS_ENV,
                DEFAULT_SYNC_INTERVAL_SECS,
            )?),
            max_sessions: parse_or(&get, MAX_SESSIONS_ENV, DEFAULT_MAX_SESSIONS)?,
            session_idle: Duration::from_secs(parse_or(
                &get,
                SESSION_IDLE_SECS_ENV,
                DEFAULT_SESSION_IDLE_SECS,
            )?),
        })
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.parse().map_err(|e| invalid(name, e)),
        None => Ok(default),
    }
}
