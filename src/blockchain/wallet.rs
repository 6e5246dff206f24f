// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Message construction for wallet v4 contracts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::cell::{Cell, CellBuilder, CellError};
use super::types::Coins;

/// Subwallet id base for v4 wallets; the workchain is added to it.
pub const DEFAULT_WALLET_ID_BASE: u32 = 698_983_191;

/// A wallet v4 external message carries at most this many internal messages.
pub const MAX_MESSAGES: usize = 4;

/// Seconds a signed transfer stays valid once the wallet is deployed.
pub const TRANSFER_TIMEOUT_SECS: u32 = 60;

pub const SEND_MODE_PAY_FEES_SEPARATELY: u8 = 1;
pub const SEND_MODE_IGNORE_ERRORS: u8 = 2;
pub const SEND_MODE_CARRY_ALL_BALANCE: u8 = 128;

/// Default mode for fixed-amount transfers.
pub const SEND_MODE_DEFAULT: u8 = SEND_MODE_PAY_FEES_SEPARATELY | SEND_MODE_IGNORE_ERRORS;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("a transfer needs at least one message")]
    NoMessages,

    #[error("wallet v4 supports at most {MAX_MESSAGES} messages, got {0}")]
    TooManyMessages(usize),

    #[error(transparent)]
    Cell(#[from] CellError),
}

/// Contract code and data used to deploy an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInit {
    pub code: Option<Arc<Cell>>,
    pub data: Option<Arc<Cell>>,
}

impl StateInit {
    /// `_ split_depth:(Maybe (## 5)) special:(Maybe TickTock) code:(Maybe ^Cell)
    /// data:(Maybe ^Cell) library:(HashmapE 256 SimpleLib)`
    pub fn store(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        builder
            .store_bit(false)?
            .store_bit(false)?
            .store_maybe_ref(self.code.clone())?
            .store_maybe_ref(self.data.clone())?
            .store_bit(false)?;
        Ok(())
    }

    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut builder = CellBuilder::new();
        self.store(&mut builder)?;
        Ok(builder.build())
    }

    /// Address an account deployed with this state would get.
    pub fn address(&self, workchain: i8) -> Result<Address, CellError> {
        Ok(Address::new(workchain, self.to_cell()?.hash()))
    }
}

/// Append `Maybe (Either StateInit ^StateInit)` and `Either X ^X` for the body.
fn store_init_and_body(
    builder: &mut CellBuilder,
    state_init: Option<&StateInit>,
    body: &Cell,
) -> Result<(), CellError> {
    match state_init {
        Some(init) => {
            builder.store_bit(true)?;
            let init_cell = init.to_cell()?;
            let by_ref = builder.available_bits() < 2 + init_cell.bit_len() + body.bit_len()
                || builder.ref_count() + init_cell.refs().len() > 4;
            if by_ref {
                builder.store_bit(true)?.store_ref(init_cell)?;
            } else {
                builder.store_bit(false)?.store_cell_contents(&init_cell)?;
            }
        }
        None => {
            builder.store_bit(false)?;
        }
    }

    let by_ref = builder.available_bits() < 1 + body.bit_len()
        || builder.ref_count() + body.refs().len() > 4;
    if by_ref {
        builder.store_bit(true)?.store_ref(body.clone())?;
    } else {
        builder.store_bit(false)?.store_cell_contents(body)?;
    }
    Ok(())
}

/// Outbound internal message as it will be placed in the wallet request.
#[derive(Debug, Clone, Copy)]
pub struct InternalMessage<'a> {
    pub to: &'a Address,
    pub value: Coins,
    pub bounce: bool,
    pub state_init: Option<&'a StateInit>,
    pub body: Option<&'a Cell>,
}

impl InternalMessage<'_> {
    /// Serialize as a relaxed `Message`: `int_msg_info$0` with `addr_none`
    /// source and zeroed fees / logical time.
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let empty = Cell::empty();
        let body = self.body.unwrap_or(&empty);

        let mut b = CellBuilder::new();
        b.store_bit(false)? // int_msg_info$0
            .store_bit(true)? // ihr_disabled
            .store_bit(self.bounce)?
            .store_bit(false)? // bounced
            .store_address(None)?
            .store_address(Some(self.to))?
            .store_coins(self.value)?
            .store_bit(false)? // no extra currencies
            .store_coins(0)? // ihr_fee
            .store_coins(0)? // fwd_fee
            .store_uint(0, 64)? // created_lt
            .store_uint(0, 32)?; // created_at
        store_init_and_body(&mut b, self.state_init, body)?;
        Ok(b.build())
    }
}

/// `ext_in_msg_info$10` addressed to `to`.
pub fn build_external_message(
    to: &Address,
    state_init: Option<&StateInit>,
    body: &Cell,
) -> Result<Cell, CellError> {
    let mut b = CellBuilder::new();
    b.store_uint(0b10, 2)?
        .store_address(None)?
        .store_address(Some(to))?
        .store_coins(0)?; // import_fee
    store_init_and_body(&mut b, state_init, body)?;
    Ok(b.build())
}

/// One entry of a wallet request: send mode plus the serialized message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub send_mode: u8,
    pub message: Cell,
}

/// `valid_until` field: unbounded for the deploying transfer.
pub fn valid_until(seqno: u32, now: u32) -> u32 {
    if seqno == 0 {
        u32::MAX
    } else {
        now.saturating_add(TRANSFER_TIMEOUT_SECS)
    }
}

/// A v4 wallet as seen by the transfer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletV4 {
    pub address: Address,
    pub wallet_id: u32,
}

impl WalletV4 {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            wallet_id: Self::default_wallet_id(address.workchain),
        }
    }

    pub fn default_wallet_id(workchain: i8) -> u32 {
        DEFAULT_WALLET_ID_BASE.wrapping_add(workchain as i32 as u32)
    }

    /// Initial data: `seqno:uint32 wallet_id:uint32 public_key:bits256 plugins:(HashmapE 256 Bool)`.
    pub fn data_cell(public_key: &[u8; 32], wallet_id: u32) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_uint(0, 32)?
            .store_uint(wallet_id as u128, 32)?
            .store_bytes(public_key)?
            .store_bit(false)?;
        Ok(b.build())
    }

    /// The part of the request body covered by the signature.
    pub fn signing_message(
        &self,
        seqno: u32,
        valid_until: u32,
        messages: &[OutgoingMessage],
    ) -> Result<Cell, WalletError> {
        if messages.is_empty() {
            return Err(WalletError::NoMessages);
        }
        if messages.len() > MAX_MESSAGES {
            return Err(WalletError::TooManyMessages(messages.len()));
        }

        let mut b = CellBuilder::new();
        b.store_uint(self.wallet_id as u128, 32)?
            .store_uint(valid_until as u128, 32)?
            .store_uint(seqno as u128, 32)?
            .store_uint(0, 8)?; // simple send
        for message in messages {
            b.store_uint(message.send_mode as u128, 8)?
                .store_ref(message.message.clone())?;
        }
        Ok(b.build())
    }

    /// `signature:bits512` followed by the signing message.
    pub fn request_body(signature: &[u8; 64], signing_message: &Cell) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_bytes(signature)?.store_cell_contents(signing_message)?;
        Ok(b.build())
    }

    /// External message with a zero signature, for fee estimation.
    pub fn unsigned_external(
        &self,
        seqno: u32,
        valid_until: u32,
        messages: &[OutgoingMessage],
        state_init: Option<&StateInit>,
    ) -> Result<Cell, WalletError> {
        let signing = self.signing_message(seqno, valid_until, messages)?;
        let body = Self::request_body(&[0u8; 64], &signing)?;
        Ok(build_external_message(&self.address, state_init, &body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Address {
        Address::new(0, [0x11; 32])
    }

    fn sample_init() -> StateInit {
        let mut code = CellBuilder::new();
        code.store_uint(0xff00, 16).unwrap();
        StateInit {
            code: Some(Arc::new(code.build())),
            data: Some(Arc::new(WalletV4::data_cell(&[0x22; 32], 698_983_191).unwrap())),
        }
    }

    #[test]
    fn default_wallet_id_depends_on_workchain() {
        assert_eq!(WalletV4::default_wallet_id(0), 698_983_191);
        assert_eq!(WalletV4::default_wallet_id(-1), 698_983_190);
    }

    #[test]
    fn data_cell_layout() {
        let cell = WalletV4::data_cell(&[0x22; 32], 7).unwrap();
        assert_eq!(cell.bit_len(), 32 + 32 + 256 + 1);
        let mut s = cell.parse();
        assert_eq!(s.load_u32().unwrap(), 0);
        assert_eq!(s.load_u32().unwrap(), 7);
    }

    #[test]
    fn internal_message_without_body_inlines_empty_body() {
        let to = target();
        let cell = InternalMessage {
            to: &to,
            value: 1_500_000_000,
            bounce: true,
            state_init: None,
            body: None,
        }
        .to_cell()
        .unwrap();

        let mut s = cell.parse();
        assert!(!s.load_bit().unwrap());
        assert!(s.load_bit().unwrap()); // ihr_disabled
        assert!(s.load_bit().unwrap()); // bounce
        assert!(!s.load_bit().unwrap()); // bounced
        assert_eq!(s.load_address().unwrap(), None);
        assert_eq!(s.load_address().unwrap(), Some(to));
        assert_eq!(s.load_coins().unwrap(), 1_500_000_000);
        assert!(!s.load_bit().unwrap());
        assert_eq!(s.load_coins().unwrap(), 0);
        assert_eq!(s.load_coins().unwrap(), 0);
        assert_eq!(s.load_u64().unwrap(), 0);
        assert_eq!(s.load_u32().unwrap(), 0);
        assert!(!s.load_bit().unwrap()); // no init
        assert!(!s.load_bit().unwrap()); // body inline
        assert_eq!(s.remaining_bits(), 0);
        assert!(cell.refs().is_empty());
    }

    #[test]
    fn large_body_goes_by_reference() {
        let mut body = CellBuilder::new();
        body.store_bytes(&[0xaa; 100]).unwrap();
        let body = body.build();
        let to = target();
        let cell = InternalMessage {
            to: &to,
            value: 0,
            bounce: false,
            state_init: None,
            body: Some(&body),
        }
        .to_cell()
        .unwrap();
        assert_eq!(cell.refs().len(), 1);
        assert_eq!(cell.refs()[0].hash(), body.hash());
    }

    #[test]
    fn state_init_layout_and_address() {
        let init = sample_init();
        let cell = init.to_cell().unwrap();
        assert_eq!(cell.bit_len(), 5);
        assert_eq!(cell.refs().len(), 2);
        assert_eq!(init.address(0).unwrap().hash, cell.hash());
    }

    #[test]
    fn signing_message_layout() {
        let wallet = WalletV4::new(target());
        let to = target();
        let message = InternalMessage {
            to: &to,
            value: 1,
            bounce: false,
            state_init: None,
            body: None,
        }
        .to_cell()
        .unwrap();
        let out = vec![OutgoingMessage {
            send_mode: SEND_MODE_DEFAULT,
            message,
        }];
        let signing = wallet.signing_message(0, valid_until(0, 1_000), &out).unwrap();
        let mut s = signing.parse();
        assert_eq!(s.load_u32().unwrap(), 698_983_191);
        assert_eq!(s.load_u32().unwrap(), u32::MAX);
        assert_eq!(s.load_u32().unwrap(), 0);
        assert_eq!(s.load_u8().unwrap(), 0);
        assert_eq!(s.load_u8().unwrap(), 3);
        assert_eq!(signing.refs().len(), 1);
    }

    #[test]
    fn valid_until_is_bounded_after_deploy() {
        assert_eq!(valid_until(0, 1_000), u32::MAX);
        assert_eq!(valid_until(5, 1_000), 1_060);
    }

    #[test]
    fn message_count_is_limited() {
        let wallet = WalletV4::new(target());
        let one = OutgoingMessage {
            send_mode: SEND_MODE_DEFAULT,
            message: Cell::empty(),
        };
        assert_eq!(
            wallet.signing_message(1, 0, &vec![one.clone(); 5]).unwrap_err(),
            WalletError::TooManyMessages(5)
        );
        assert_eq!(
            wallet.signing_message(1, 0, &[]).unwrap_err(),
            WalletError::NoMessages
        );
        assert!(wallet.signing_message(1, 0, &vec![one; 4]).is_ok());
    }

    #[test]
    fn unsigned_external_carries_zero_signature() {
        let wallet = WalletV4::new(target());
        let out = vec![OutgoingMessage {
            send_mode: SEND_MODE_DEFAULT,
            message: Cell::empty(),
        }];
        let init = sample_init();
        let ext = wallet
            .unsigned_external(0, u32::MAX, &out, Some(&init))
            .unwrap();
        let mut s = ext.parse();
        assert_eq!(s.load_uint(2).unwrap(), 0b10);
        assert_eq!(s.load_address().unwrap(), None);
        assert_eq!(s.load_address().unwrap(), Some(wallet.address));
        assert_eq!(s.load_coins().unwrap(), 0);
        assert!(s.load_bit().unwrap()); // init present
        assert!(!s.load_bit().unwrap()); // init inline
        s.skip_bits(5).unwrap();
        let body_by_ref = s.load_bit().unwrap();
        assert!(!body_by_ref);
        assert_eq!(s.load_bytes(64).unwrap(), vec![0u8; 64]);
    }
}
