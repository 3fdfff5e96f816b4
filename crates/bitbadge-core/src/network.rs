//! Address parameter sets for the Bitcoin networks the client can target.

use std::fmt;
use std::str::FromStr;

use bitcoin::bech32::Hrp;
use serde::Serialize;

/// Human-readable prefix and base58 version bytes for one chain's addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkParams {
    pub name: &'static str,
    pub bech32_hrp: &'static str,
    /// Version byte of base58 P2PKH addresses.
    pub pub_key_hash: u8,
    /// Version byte of base58 P2SH addresses.
    pub script_hash: u8,
}

impl NetworkParams {
    pub const MAINNET: Self = Self {
        name: "mainnet",
        bech32_hrp: "bc",
        pub_key_hash: 0x00,
        script_hash: 0x05,
    };

    pub const TESTNET: Self = Self {
        name: "testnet",
        bech32_hrp: "tb",
        pub_key_hash: 0x6f,
        script_hash: 0xc4,
    };

    pub const SIGNET: Self = Self {
        name: "signet",
        ..Self::TESTNET
    };

    pub const REGTEST: Self = Self {
        name: "regtest",
        bech32_hrp: "bcrt",
        pub_key_hash: 0x6f,
        script_hash: 0xc4,
    };
}

impl NetworkParams {
    /// Whether `address` belongs to this chain: a segwit address under
    /// `bech32_hrp`, or a base58check P2PKH/P2SH address with one of this
    /// chain's version bytes.
    pub fn accepts_address(&self, address: &str) -> bool {
        let address = address.trim();
        if let Ok((hrp, _, _)) = bitcoin::bech32::segwit::decode(address) {
            return Hrp::parse(self.bech32_hrp).is_ok_and(|expected| hrp == expected);
        }
        match bitcoin::base58::decode_check(address) {
            Ok(payload) if payload.len() == 21 => {
                payload[0] == self.pub_key_hash || payload[0] == self.script_hash
            }
            _ => false,
        }
    }
}

impl From<bitcoin::Network> for NetworkParams {
    fn from(network: bitcoin::Network) -> Self {
        match network {
            bitcoin::Network::Bitcoin => Self::MAINNET,
            bitcoin::Network::Signet => Self::SIGNET,
            bitcoin::Network::Regtest => Self::REGTEST,
            // Testnet3, testnet4 and any future test network share the `tb` prefix.
            _ => Self::TESTNET,
        }
    }
}

impl FromStr for NetworkParams {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Self::MAINNET),
            "testnet" | "test" => Ok(Self::TESTNET),
            "signet" => Ok(Self::SIGNET),
            "regtest" => Ok(Self::REGTEST),
            other => Err(format!(
                "unknown network `{other}`; expected mainnet, testnet, signet or regtest"
            )),
        }
    }
}

impl fmt::Display for NetworkParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
