// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network constants and shared chain types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One TON = 10^9 nanotons.
pub const TON_DECIMALS: u8 = 9;

/// Native amounts in nanotons (`Coins` on the wire, `VarUInteger 16`).
pub type Coins = u128;

/// Serde adapter carrying [`Coins`] as a decimal string, since JSON numbers
/// lose precision above 2^53.
pub mod coins_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Coins;

    pub fn serialize<S: Serializer>(value: &Coins, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Coins, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| D::Error::custom(format!("invalid amount `{raw}`")))
    }
}

/// TON network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// v4 HTTP API endpoint
    pub api_url: &'static str,
    /// Root DNS collection, raw form
    pub dns_root: &'static str,
    /// Whether friendly addresses carry the testnet flag
    pub testnet: bool,
}

/// TON mainnet configuration.
pub const TON_MAINNET: NetworkConfig = NetworkConfig {
    name: "TON Mainnet",
    api_url: "https://mainnet-v4.tonhubapi.com",
    dns_root: "-1:e56754f83426f69b09267bd876ac97c44821345b7e266bd956a7bfbfb98df35c",
    testnet: false,
};

/// TON testnet configuration.
pub const TON_TESTNET: NetworkConfig = NetworkConfig {
    name: "TON Testnet",
    api_url: "https://testnet-v4.tonhubapi.com",
    dns_root: "-1:e56754f83426f69b09267bd876ac97c44821345b7e266bd956a7bfbfb98df35c",
    testnet: true,
};

/// Which network the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Test,
}

impl Network {
    /// Parse `main`/`mainnet` or `test`/`testnet` (case-insensitive).
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(Network::Main),
            "test" | "testnet" => Ok(Network::Test),
            other => Err(format!(
                "unknown network `{other}`; expected `main` or `test`"
            )),
        }
    }

    pub fn config(self) -> &'static NetworkConfig {
        match self {
            Network::Main => &TON_MAINNET,
            Network::Test => &TON_TESTNET,
        }
    }

    pub fn is_testnet(self) -> bool {
        self.config().testnet
    }
}
