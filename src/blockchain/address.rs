// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Standard TON account addresses.
//!
//! Two textual forms are accepted:
//! - raw: `<workchain>:<64 hex chars>`
//! - user-friendly: 48 base64 characters (standard or URL-safe alphabet)
//!   encoding `[flags][workchain][hash:32][crc16:2]`.

use std::fmt;
use std::str::FromStr;

use base64ct::{Base64, Base64Url, Encoding};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const FLAG_TESTNET: u8 = 0x80;

const FRIENDLY_LEN: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address has invalid length {0}")]
    InvalidLength(usize),

    #[error("invalid workchain `{0}`")]
    InvalidWorkchain(String),

    #[error("invalid account hash: {0}")]
    InvalidHash(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("unknown address tag 0x{0:02x}")]
    InvalidTag(u8),

    #[error("address checksum mismatch")]
    ChecksumMismatch,
}

/// A standard (`addr_std`, non-anycast) account address.
///
/// Equality ignores the bounceable/testnet flags, which only matter for
/// the friendly representation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub workchain: i8,
    pub hash: [u8; 32],
}

/// A friendly address together with the flags it was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FriendlyAddress {
    pub address: Address,
    pub bounceable: bool,
    pub testnet: bool,
}

impl Address {
    pub const fn new(workchain: i8, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    /// Parse either textual form.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let input = input.trim();
        if Self::is_raw(input) {
            Self::parse_raw(input)
        } else {
            Self::parse_friendly(input).map(|f| f.address)
        }
    }

    /// Cheap syntactic check that `input` looks like an address at all.
    pub fn is_valid(input: &str) -> bool {
        Self::parse(input).is_ok()
    }

    fn is_raw(input: &str) -> bool {
        input.contains(':')
    }

    pub fn parse_raw(input: &str) -> Result<Self, AddressError> {
        let (wc, hash_hex) = input
            .split_once(':')
            .ok_or(AddressError::InvalidLength(input.len()))?;
        let workchain: i8 = wc
            .parse()
            .map_err(|_| AddressError::InvalidWorkchain(wc.to_string()))?;
        if hash_hex.len() != 64 {
            return Err(AddressError::InvalidHash(format!(
                "expected 64 hex chars, got {}",
                hash_hex.len()
            )));
        }

        let mut hash = [0u8; 32];
        hex::decode_to_slice(hash_hex, &mut hash)
            .map_err(|e| AddressError::InvalidHash(e.to_string()))?;
        Ok(Self { workchain, hash })
    }

    pub fn parse_friendly(input: &str) -> Result<FriendlyAddress, AddressError> {
        if input.len() != FRIENDLY_LEN {
            return Err(AddressError::InvalidLength(input.len()));
        }
        let bytes = if input.contains(['-', '_']) {
            Base64Url::decode_vec(input)
        } else {
            Base64::decode_vec(input)
        }
        .map_err(|_| AddressError::InvalidBase64)?;
        if bytes.len() != 36 {
            return Err(AddressError::InvalidLength(bytes.len()));
        }

        let expected = crc16(&bytes[..34]);
        if bytes[34..36] != expected.to_be_bytes() {
            return Err(AddressError::ChecksumMismatch);
        }

        let mut tag = bytes[0];
        let testnet = tag & FLAG_TESTNET != 0;
        tag &= !FLAG_TESTNET;
        let bounceable = match tag {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            _ => return Err(AddressError::InvalidTag(bytes[0])),
        };

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);
        Ok(FriendlyAddress {
            address: Self {
                workchain: bytes[1] as i8,
                hash,
            },
            bounceable,
            testnet,
        })
    }

    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    pub fn to_friendly(&self, bounceable: bool, testnet: bool, url_safe: bool) -> String {
        let mut tag = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if testnet {
            tag |= FLAG_TESTNET;
        }

        let mut bytes = Vec::with_capacity(36);
        bytes.push(tag);
        bytes.push(self.workchain as u8);
        bytes.extend_from_slice(&self.hash);
        bytes.extend_from_slice(&crc16(&bytes).to_be_bytes());

        if url_safe {
            Base64Url::encode_string(&bytes)
        } else {
            Base64::encode_string(&bytes)
        }
    }
}

/// CRC-16/XMODEM (poly 0x1021, init 0).
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_friendly(true, false, true))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_raw())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}
