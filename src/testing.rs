// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scriptable in-memory [`TonClient`] shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::blockchain::client::{AccountStatus, RunResult};
use crate::blockchain::fees::tests::sample_config;
use crate::blockchain::retry::RetryConfig;
use crate::blockchain::tuple::TupleItem;
use crate::blockchain::{
    AccountState, Address, BlockRef, Cell, ClientError, FeeConfig, StorageStat, TonClient,
};
use crate::config::ServiceConfig;
use crate::state::AppState;

pub(crate) const MOCK_NOW: u32 = 1_700_000_000;

/// Root resolver used by [`app_state`].
pub(crate) const MOCK_DNS_ROOT: Address = Address::new(-1, [0xee; 32]);

/// Application state over a mock client with default settings and no retries.
pub(crate) fn app_state(client: Arc<MockTonClient>) -> AppState {
    let mut config = ServiceConfig::from_lookup(|_| None).unwrap();
    config.dns_root = MOCK_DNS_ROOT;
    config.retry = RetryConfig::none();
    AppState::new(client, &config)
}

struct DnsAnswer {
    resolved_bits: i128,
    record: Option<Cell>,
    delay: Duration,
}

pub(crate) struct MockTonClient {
    seqno: AtomicU32,
    balance: Mutex<u128>,
    block_delay: Mutex<Duration>,
    failures_left: AtomicU32,
    dns: Mutex<HashMap<(Address, Vec<u8>), DnsAnswer>>,
    last_block_calls: AtomicU32,
    account_calls: AtomicU32,
    run_method_calls: AtomicU32,
    fee_config_calls: AtomicU32,
}

impl MockTonClient {
    pub(crate) fn new() -> Self {
        Self {
            seqno: AtomicU32::new(1),
            balance: Mutex::new(10_000_000_000),
            block_delay: Mutex::new(Duration::ZERO),
            failures_left: AtomicU32::new(0),
            dns: Mutex::new(HashMap::new()),
            last_block_calls: AtomicU32::new(0),
            account_calls: AtomicU32::new(0),
            run_method_calls: AtomicU32::new(0),
            fee_config_calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn set_seqno(&self, seqno: u32) {
        self.seqno.store(seqno, Ordering::SeqCst);
    }

    pub(crate) fn set_block_delay(&self, delay: Duration) {
        *self.block_delay.lock().unwrap() = delay;
    }

    /// Make the next `count` calls to `get_last_block` fail with a
    /// retryable error.
    pub(crate) fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub(crate) fn script_dns(
        &self,
        resolver: Address,
        name: &[u8],
        resolved_bits: i128,
        record: Option<Cell>,
    ) {
        self.script_dns_delayed(resolver, name, resolved_bits, record, Duration::ZERO);
    }

    pub(crate) fn script_dns_delayed(
        &self,
        resolver: Address,
        name: &[u8],
        resolved_bits: i128,
        record: Option<Cell>,
        delay: Duration,
    ) {
        self.dns.lock().unwrap().insert(
            (resolver, name.to_vec()),
            DnsAnswer {
                resolved_bits,
                record,
                delay,
            },
        );
    }

    pub(crate) fn last_block_calls(&self) -> u32 {
        self.last_block_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn account_calls(&self) -> u32 {
        self.account_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn run_method_calls(&self) -> u32 {
        self.run_method_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fee_config_calls(&self) -> u32 {
        self.fee_config_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TonClient for MockTonClient {
    async fn get_last_block(&self) -> Result<BlockRef, ClientError> {
        self.last_block_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.block_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ClientError::Http("connection reset".to_string()));
        }
        Ok(BlockRef {
            seqno: 1000,
            now: MOCK_NOW,
        })
    }

    async fn get_account(
        &self,
        _block: BlockRef,
        _address: &Address,
    ) -> Result<AccountState, ClientError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccountState {
            balance: *self.balance.lock().unwrap(),
            status: AccountStatus::Active {
                code: None,
                data: None,
            },
            storage: Some(StorageStat {
                last_paid: MOCK_NOW,
                due_payment: None,
                used_bits: 1000,
                used_cells: 3,
                used_public_cells: 0,
            }),
        })
    }

    async fn run_method(
        &self,
        _block: BlockRef,
        address: &Address,
        method: &str,
        args: &[TupleItem],
    ) -> Result<RunResult, ClientError> {
        self.run_method_calls.fetch_add(1, Ordering::SeqCst);
        match method {
            "seqno" => Ok(RunResult {
                exit_code: 0,
                stack: vec![TupleItem::Int(self.seqno.load(Ordering::SeqCst) as i128)],
            }),
            "dnsresolve" => {
                let Some(TupleItem::Slice(name)) = args.first() else {
                    return Err(ClientError::Encoding("dnsresolve needs a slice".to_string()));
                };
                let key = (*address, name.data().to_vec());
                let (bits, record, delay) = match self.dns.lock().unwrap().get(&key) {
                    Some(answer) => (answer.resolved_bits, answer.record.clone(), answer.delay),
                    None => (0, None, Duration::ZERO),
                };
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let record = match record {
                    Some(cell) => TupleItem::Cell(cell.into()),
                    None => TupleItem::Null,
                };
                Ok(RunResult {
                    exit_code: 0,
                    stack: vec![TupleItem::Int(bits), record],
                })
            }
            _ => Ok(RunResult {
                exit_code: 11,
                stack: Vec::new(),
            }),
        }
    }

    async fn get_fee_config(&self, _block: BlockRef) -> Result<FeeConfig, ClientError> {
        self.fee_config_calls.fetch_add(1, Ordering::SeqCst);
        Ok(sample_config())
    }
}
