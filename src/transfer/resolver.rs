// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recipient resolution.
//!
//! Turns what the user typed into a canonical address. Literal addresses
//! (raw `wc:hex` or user-friendly base64) are recognised synchronously.
//! `.ton` and `.t.me` names are looked up through TON DNS: the `dnsresolve`
//! get-method is called on the root resolver and then on each next resolver
//! it points to, until the whole name is consumed.
//!
//! Requests are sequenced. Only the result of the most recently issued
//! request is ever stored as the current target; late answers to older
//! requests are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::blockchain::cell::{Cell, CellBuilder};
use crate::blockchain::tuple::TupleItem;
use crate::blockchain::{Address, TonClient};

use super::error::TransferError;

/// `dns_smc_address#9fd3`
pub const DNS_SMC_ADDRESS_TAG: u16 = 0x9fd3;
/// `dns_next_resolver#ba93`
pub const DNS_NEXT_RESOLVER_TAG: u16 = 0xba93;

const MAX_RESOLVER_HOPS: usize = 8;

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub raw_input: String,
    pub canonical_address: Address,
    pub bounceable: bool,
    pub resolved_from_domain: bool,
    pub domain: Option<String>,
}

/// Supported name suffixes and their label grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zone {
    Ton,
    Telegram,
}

impl Zone {
    fn split(name: &str) -> Option<(Zone, &str)> {
        if let Some(label) = name.strip_suffix(".t.me") {
            Some((Zone::Telegram, label))
        } else {
            name.strip_suffix(".ton").map(|label| (Zone::Ton, label))
        }
    }

    fn label_is_valid(self, label: &str) -> bool {
        match self {
            Zone::Ton => {
                (4..=126).contains(&label.len())
                    && label
                        .bytes()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
                    && !label.starts_with('-')
                    && !label.ends_with('-')
            }
            Zone::Telegram => {
                (4..=32).contains(&label.len())
                    && label
                        .bytes()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
            }
        }
    }
}

/// Trimmed, NFKC-normalized, lower-cased form of a name.
pub fn normalize_domain(input: &str) -> String {
    input.trim().nfkc().collect::<String>().to_lowercase()
}

/// Validate `name` (already normalized) as a supported domain.
///
/// Returns `Ok(None)` when the name has no supported suffix.
pub fn validate_domain(name: &str) -> Result<Option<&str>, TransferError> {
    let Some((zone, label)) = Zone::split(name) else {
        return Ok(None);
    };
    if !zone.label_is_valid(label) {
        return Err(TransferError::DomainInvalid(name.to_string()));
    }
    Ok(Some(name))
}

/// DNS wire form: labels in reverse order, each terminated by a zero byte.
pub fn encode_domain(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 1);
    for label in name.rsplit('.') {
        out.extend_from_slice(label.as_bytes());
        out.push(0);
    }
    out
}

/// DNS category of wallet records: `sha256("wallet")`.
pub fn wallet_category() -> [u8; 32] {
    Sha256::digest(b"wallet").into()
}

/// Decode a DNS record carrying a `MsgAddressInt` behind a 16-bit tag.
fn parse_record(record: &Cell, tag: u16, domain: &str) -> Result<Address, TransferError> {
    let mut slice = record.parse();
    let found = slice
        .load_u16()
        .map_err(|_| TransferError::DomainNotFound(domain.to_string()))?;
    if found != tag {
        return Err(TransferError::DomainNotFound(domain.to_string()));
    }
    slice
        .load_address()
        .ok()
        .flatten()
        .ok_or_else(|| TransferError::DomainNotFound(domain.to_string()))
}

pub struct AddressResolver {
    client: Arc<dyn TonClient>,
    dns_root: Address,
    sequence: AtomicU64,
    current: watch::Sender<Option<ResolvedTarget>>,
}

impl AddressResolver {
    pub fn new(client: Arc<dyn TonClient>, dns_root: Address) -> Self {
        Self {
            client,
            dns_root,
            sequence: AtomicU64::new(0),
            current: watch::Sender::new(None),
        }
    }

    /// Recognise a literal address without touching the network.
    pub fn try_literal(input: &str) -> Option<ResolvedTarget> {
        let trimmed = input.trim();
        let (address, bounceable) = if trimmed.contains(':') {
            (Address::parse_raw(trimmed).ok()?, true)
        } else {
            let friendly = Address::parse_friendly(trimmed).ok()?;
            (friendly.address, friendly.bounceable)
        };
        Some(ResolvedTarget {
            raw_input: input.to_string(),
            canonical_address: address,
            bounceable,
            resolved_from_domain: false,
            domain: None,
        })
    }

    /// Resolve `input` and make it the current target.
    ///
    /// `Ok(None)` means a newer request was issued while this one was in
    /// flight; its result was discarded.
    pub async fn resolve(&self, input: &str) -> Result<Option<ResolvedTarget>, TransferError> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(target) = Self::try_literal(input) {
            return Ok(self.apply(seq, Some(target.clone())).then_some(target));
        }

        match self.lookup(input).await {
            Ok(target) => {
                if self.apply(seq, Some(target.clone())) {
                    Ok(Some(target))
                } else {
                    debug!(seq, input, "Discarding superseded resolution");
                    Ok(None)
                }
            }
            Err(e) => {
                if self.apply(seq, None) {
                    Err(e)
                } else {
                    debug!(seq, input, error = %e, "Discarding superseded resolution error");
                    Ok(None)
                }
            }
        }
    }

    /// Resolve without sequencing or touching the current target.
    pub async fn lookup(&self, input: &str) -> Result<ResolvedTarget, TransferError> {
        if let Some(target) = Self::try_literal(input) {
            return Ok(target);
        }

        let name = normalize_domain(input);
        if name.is_empty() {
            return Err(TransferError::DomainInvalid(String::new()));
        }
        let Some(domain) = validate_domain(&name)? else {
            return Err(TransferError::InvalidAddress(input.trim().to_string()));
        };

        let address = self.dns_resolve(domain).await?;
        debug!(domain, address = %address, "Resolved domain");
        Ok(ResolvedTarget {
            raw_input: input.to_string(),
            canonical_address: address,
            bounceable: true,
            resolved_from_domain: true,
            domain: Some(domain.to_string()),
        })
    }

    /// Input was cleared: forget the current target and drop in-flight results.
    pub fn clear(&self) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.apply(seq, None);
    }

    pub fn current(&self) -> Option<ResolvedTarget> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ResolvedTarget>> {
        self.current.subscribe()
    }

    /// Store `target` if `seq` is still the latest issued request.
    fn apply(&self, seq: u64, target: Option<ResolvedTarget>) -> bool {
        self.current.send_if_modified(|slot| {
            if self.sequence.load(Ordering::SeqCst) != seq {
                return false;
            }
            *slot = target;
            true
        })
    }

    async fn dns_resolve(&self, domain: &str) -> Result<Address, TransferError> {
        let not_found = || TransferError::DomainNotFound(domain.to_string());
        let malformed =
            |e: String| TransferError::NetworkUnavailable(format!("malformed dnsresolve result: {e}"));

        let block = self.client.get_last_block().await?;
        let category = wallet_category();
        let mut resolver = self.dns_root;
        let mut name = encode_domain(domain);

        for _ in 0..MAX_RESOLVER_HOPS {
            let mut subdomain = CellBuilder::new();
            subdomain.store_bytes(&name)?;
            let args = [
                TupleItem::Slice(Arc::new(subdomain.build())),
                TupleItem::UInt256(category),
            ];
            let result = self
                .client
                .run_method(block, &resolver, "dnsresolve", &args)
                .await?;
            if result.exit_code != 0 {
                debug!(domain, resolver = %resolver, exit_code = result.exit_code, "dnsresolve failed");
                return Err(not_found());
            }

            let mut reader = result.reader();
            let resolved_bits = reader.read_int().map_err(|e| malformed(e.to_string()))?;
            let record = reader.read_cell_opt().map_err(|e| malformed(e.to_string()))?;

            let total_bits = (name.len() * 8) as i128;
            if resolved_bits <= 0 || resolved_bits % 8 != 0 || resolved_bits > total_bits {
                return Err(not_found());
            }
            let record = record.ok_or_else(not_found)?;

            if resolved_bits == total_bits {
                return parse_record(&record, DNS_SMC_ADDRESS_TAG, domain);
            }
            resolver = parse_record(&record, DNS_NEXT_RESOLVER_TAG, domain)?;
            name = name.split_off((resolved_bits / 8) as usize);
        }

        Err(not_found())
    }
}

/// `dns_smc_address#9fd3 smc_addr:MsgAddressInt flags:(## 8)`
#[cfg(test)]
pub(crate) fn wallet_record(address: &Address) -> Cell {
    let mut b = CellBuilder::new();
    b.store_uint(DNS_SMC_ADDRESS_TAG as u128, 16)
        .and_then(|b| b.store_address(Some(address)))
        .and_then(|b| b.store_uint(0, 8))
        .unwrap();
    b.build()
}

/// `dns_next_resolver#ba93 resolver:MsgAddressInt`
#[cfg(test)]
pub(crate) fn next_resolver_record(address: &Address) -> Cell {
    let mut b = CellBuilder::new();
    b.store_uint(DNS_NEXT_RESOLVER_TAG as u128, 16)
        .and_then(|b| b.store_address(Some(address)))
        .unwrap();
    b.build()
}
