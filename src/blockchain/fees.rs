// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network fee configuration and the local fee formulas.
//!
//! Config params read here:
//! - 18: storage prices (`Hashmap 32 StoragePrices`)
//! - 20 / 21: gas prices for masterchain / basechain
//! - 24 / 25: message forward prices for masterchain / basechain

use std::collections::HashSet;

use super::cell::{Cell, CellError, CellSlice};
use super::client::StorageStat;
use super::dict;
use super::types::Coins;

/// Gas consumed by a wallet v4 transaction sending 1..=4 messages.
pub const GAS_BY_OUT_MESSAGES: [u64; 4] = [3308, 3950, 4592, 5234];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeConfigError {
    #[error("config param {0} is missing")]
    MissingParam(u32),

    #[error("config param {param} has unknown tag 0x{tag:02x}")]
    UnknownTag { param: u32, tag: u8 },

    #[error("storage price list is empty")]
    NoStoragePrices,

    #[error("malformed config param: {0}")]
    Cell(#[from] CellError),
}

/// `storage_prices#cc`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoragePrices {
    pub utime_since: u32,
    pub bit_price_ps: u64,
    pub cell_price_ps: u64,
    pub mc_bit_price_ps: u64,
    pub mc_cell_price_ps: u64,
}

/// Gas prices with the flat-rate prefix folded in (zero when absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPrices {
    pub flat_gas_limit: u64,
    pub flat_gas_price: u64,
    /// Price per gas unit, scaled by 2^16.
    pub gas_price: u64,
}

/// `msg_forward_prices#ea`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgForwardPrices {
    pub lump_price: u64,
    pub bit_price: u64,
    pub cell_price: u64,
    pub ihr_price_factor: u32,
    pub first_frac: u16,
    pub next_frac: u16,
}

/// Everything the fee formulas need from the network config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeConfig {
    pub storage: Vec<StoragePrices>,
    pub masterchain_gas: GasPrices,
    pub workchain_gas: GasPrices,
    pub masterchain_msg: MsgForwardPrices,
    pub workchain_msg: MsgForwardPrices,
}

fn load_param(root: &Cell, param: u32) -> Result<Cell, FeeConfigError> {
    let value = dict::lookup(root, 32, param as u128)?.ok_or(FeeConfigError::MissingParam(param))?;
    let mut slice = value.parse();
    Ok(Cell::clone(slice.load_ref()?))
}

fn parse_storage_prices(cell: &Cell) -> Result<Vec<StoragePrices>, FeeConfigError> {
    let mut prices = Vec::new();
    for value in dict::entries(cell, 32)?.values() {
        let mut s = value.parse();
        let tag = s.load_u8()?;
        if tag != 0xcc {
            return Err(FeeConfigError::UnknownTag { param: 18, tag });
        }
        prices.push(StoragePrices {
            utime_since: s.load_u32()?,
            bit_price_ps: s.load_u64()?,
            cell_price_ps: s.load_u64()?,
            mc_bit_price_ps: s.load_u64()?,
            mc_cell_price_ps: s.load_u64()?,
        });
    }
    if prices.is_empty() {
        return Err(FeeConfigError::NoStoragePrices);
    }
    prices.sort_by_key(|p| p.utime_since);
    Ok(prices)
}

fn parse_gas_prices(cell: &Cell, param: u32) -> Result<GasPrices, FeeConfigError> {
    fn tail(s: &mut CellSlice<'_>, param: u32, tag: u8) -> Result<u64, FeeConfigError> {
        match tag {
            // gas_prices_ext#de gas_price gas_limit special_gas_limit gas_credit ...
            0xde | 0xdd => Ok(s.load_u64()?),
            tag => Err(FeeConfigError::UnknownTag { param, tag }),
        }
    }

    let mut s = cell.parse();
    let tag = s.load_u8()?;
    if tag == 0xd1 {
        let flat_gas_limit = s.load_u64()?;
        let flat_gas_price = s.load_u64()?;
        let inner = s.load_u8()?;
        let gas_price = tail(&mut s, param, inner)?;
        Ok(GasPrices {
            flat_gas_limit,
            flat_gas_price,
            gas_price,
        })
    } else {
        Ok(GasPrices {
            flat_gas_limit: 0,
            flat_gas_price: 0,
            gas_price: tail(&mut s, param, tag)?,
        })
    }
}

fn parse_msg_prices(cell: &Cell, param: u32) -> Result<MsgForwardPrices, FeeConfigError> {
    let mut s = cell.parse();
    let tag = s.load_u8()?;
    if tag != 0xea {
        return Err(FeeConfigError::UnknownTag { param, tag });
    }
    Ok(MsgForwardPrices {
        lump_price: s.load_u64()?,
        bit_price: s.load_u64()?,
        cell_price: s.load_u64()?,
        ihr_price_factor: s.load_u32()?,
        first_frac: s.load_u16()?,
        next_frac: s.load_u16()?,
    })
}

impl FeeConfig {
    /// Parse from the config dictionary root (`Hashmap 32 ^Cell`).
    pub fn from_config_root(root: &Cell) -> Result<Self, FeeConfigError> {
        Ok(Self {
            storage: parse_storage_prices(&load_param(root, 18)?)?,
            masterchain_gas: parse_gas_prices(&load_param(root, 20)?, 20)?,
            workchain_gas: parse_gas_prices(&load_param(root, 21)?, 21)?,
            masterchain_msg: parse_msg_prices(&load_param(root, 24)?, 24)?,
            workchain_msg: parse_msg_prices(&load_param(root, 25)?, 25)?,
        })
    }

    fn gas(&self, masterchain: bool) -> &GasPrices {
        if masterchain {
            &self.masterchain_gas
        } else {
            &self.workchain_gas
        }
    }

    fn msg(&self, masterchain: bool) -> &MsgForwardPrices {
        if masterchain {
            &self.masterchain_msg
        } else {
            &self.workchain_msg
        }
    }
}

// =============================================================================
// Formulas
// =============================================================================

/// `ceil(value / 2^16)`
pub fn shr16ceil(value: u128) -> u128 {
    (value >> 16) + u128::from(value & 0xffff != 0)
}

/// Unique cells and bits below a root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellStats {
    pub bits: u64,
    pub cells: u64,
}

impl std::ops::Add for CellStats {
    type Output = CellStats;

    fn add(self, rhs: Self) -> Self {
        CellStats {
            bits: self.bits + rhs.bits,
            cells: self.cells + rhs.cells,
        }
    }
}

/// Count unique cells reachable from `root`, optionally excluding the root.
pub fn collect_cell_stats(root: &Cell, skip_root: bool) -> CellStats {
    fn visit(cell: &Cell, count_self: bool, seen: &mut HashSet<[u8; 32]>) -> CellStats {
        if !seen.insert(cell.hash()) {
            return CellStats::default();
        }
        let mut stats = if count_self {
            CellStats {
                bits: cell.bit_len() as u64,
                cells: 1,
            }
        } else {
            CellStats::default()
        };
        for child in cell.refs() {
            stats = stats + visit(child, true, seen);
        }
        stats
    }

    visit(root, !skip_root, &mut HashSet::new())
}

/// Storage rent accumulated between `last_paid` and `now`.
pub fn compute_storage_fee(
    prices: &[StoragePrices],
    stat: &StorageStat,
    now: u32,
    masterchain: bool,
) -> Coins {
    let Some(first) = prices.first() else {
        return 0;
    };
    if now <= stat.last_paid || now < first.utime_since {
        return 0;
    }

    let mut upto = stat.last_paid.max(first.utime_since);
    let mut total: u128 = 0;
    for (i, price) in prices.iter().enumerate() {
        if upto >= now {
            break;
        }
        let valid_until = prices
            .get(i + 1)
            .map_or(now, |next| now.min(next.utime_since));
        if upto < valid_until {
            let (bit_price, cell_price) = if masterchain {
                (price.mc_bit_price_ps, price.mc_cell_price_ps)
            } else {
                (price.bit_price_ps, price.cell_price_ps)
            };
            let per_second = stat.used_cells as u128 * cell_price as u128
                + stat.used_bits as u128 * bit_price as u128;
            total += per_second * (valid_until - upto) as u128;
        }
        upto = valid_until;
    }
    shr16ceil(total)
}

/// `lump_price + ceil((bit_price * bits + cell_price * cells) / 2^16)`
pub fn compute_forward_fee(prices: &MsgForwardPrices, stats: CellStats) -> Coins {
    prices.lump_price as u128
        + shr16ceil(
            prices.bit_price as u128 * stats.bits as u128
                + prices.cell_price as u128 * stats.cells as u128,
        )
}

pub fn compute_gas_fee(prices: &GasPrices, gas_used: u64) -> Coins {
    if gas_used <= prices.flat_gas_limit {
        prices.flat_gas_price as u128
    } else {
        prices.flat_gas_price as u128
            + prices.gas_price as u128 * (gas_used - prices.flat_gas_limit) as u128 / 65536
    }
}

/// An outbound internal message as seen by the forward-fee formula.
#[derive(Debug, Clone, Copy)]
pub struct ForwardedMessage<'a> {
    pub state_init: Option<&'a Cell>,
    pub body: &'a Cell,
}

/// Full forward fee of an internal message (first fraction plus remainder).
pub fn compute_message_forward_fee(prices: &MsgForwardPrices, message: ForwardedMessage<'_>) -> Coins {
    let mut stats = collect_cell_stats(message.body, true);
    if let Some(init) = message.state_init {
        stats = stats + collect_cell_stats(init, true);
    }
    compute_forward_fee(prices, stats)
}

/// Inputs for [`estimate_transfer_fee`].
#[derive(Debug, Clone, Copy)]
pub struct TransferFeeInputs<'a> {
    pub now: u32,
    pub masterchain: bool,
    pub storage: Option<&'a StorageStat>,
    pub external_message: &'a Cell,
    pub out_messages: &'a [ForwardedMessage<'a>],
}

/// Total cost of a wallet transfer: storage + import + gas + forwarding.
pub fn estimate_transfer_fee(config: &FeeConfig, inputs: TransferFeeInputs<'_>) -> Coins {
    let msg_prices = config.msg(inputs.masterchain);

    let storage_fee = inputs.storage.map_or(0, |stat| {
        compute_storage_fee(&config.storage, stat, inputs.now, inputs.masterchain)
    });
    let import_fee =
        compute_forward_fee(msg_prices, collect_cell_stats(inputs.external_message, true));

    let index = inputs.out_messages.len().clamp(1, GAS_BY_OUT_MESSAGES.len()) - 1;
    let gas_fee = compute_gas_fee(config.gas(inputs.masterchain), GAS_BY_OUT_MESSAGES[index]);

    let forward_fee: Coins = inputs
        .out_messages
        .iter()
        .map(|m| compute_message_forward_fee(msg_prices, *m))
        .sum();

    storage_fee + import_fee + gas_fee + forward_fee
}
