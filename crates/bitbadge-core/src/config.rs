//! Runtime configuration shared by every handler.

use std::time::Duration;

use crate::clarity::{self, QualifiedContractIdentifier};
use crate::contract::ContractSet;
use crate::error::CoreError;
use crate::merkle::SiblingOrder;
use crate::network::NetworkParams;

pub const DEFAULT_ESPLORA_URL: &str = "https://blockstream.info/testnet/api";
pub const DEFAULT_NODE_URL: &str = "https://api.testnet.hiro.so";
pub const DEFAULT_TREASURY_ADDRESS: &str = "tb1qya9wtp4dyq67ldxz2pyuz40esvgd0cgx9s3pjl";
pub const DEFAULT_RESERVE_AMOUNT: u64 = 100;
pub const DEFAULT_BADGE_CONTRACT: &str = "ST3QFME3CANQFQNR86TYVKQYCFT7QX4PRXM1V9W6H.bitbadge-v3";
pub const DEFAULT_HELPER_CONTRACT: &str =
    "ST3QFME3CANQFQNR86TYVKQYCFT7QX4PRXM1V9W6H.clarity-bitcoin-bitbadge";
pub const DEFAULT_MINED_CHECK_CONTRACT: &str =
    "ST3QFME3CANQFQNR86TYVKQYCFT7QX4PRXM1V9W6H.clarity-bitcoin-bitbadge-v3";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Config {
    pub esplora_url: String,
    /// Optional outbound request cap for the explorer.
    pub explorer_requests_per_second: Option<u32>,
    pub node_url: String,
    pub network: NetworkParams,
    /// Address the reservation payment goes to.
    pub treasury_address: String,
    /// Reservation amount in satoshis.
    pub reserve_amount: u64,
    pub contracts: ContractSet,
    pub sibling_order: SiblingOrder,
    pub poll_interval: Duration,
}

impl Config {
    /// The public testnet deployment.
    pub fn testnet_defaults() -> Result<Self, CoreError> {
        Ok(Self {
            esplora_url: DEFAULT_ESPLORA_URL.to_owned(),
            explorer_requests_per_second: None,
            node_url: DEFAULT_NODE_URL.to_owned(),
            network: NetworkParams::TESTNET,
            treasury_address: DEFAULT_TREASURY_ADDRESS.to_owned(),
            reserve_amount: DEFAULT_RESERVE_AMOUNT,
            contracts: ContractSet {
                badge: parse_contract(DEFAULT_BADGE_CONTRACT)?,
                helper: parse_contract(DEFAULT_HELPER_CONTRACT)?,
                mined_check: parse_contract(DEFAULT_MINED_CHECK_CONTRACT)?,
            },
            sibling_order: SiblingOrder::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Reject settings the flow cannot work with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.reserve_amount == 0 {
            return Err(CoreError::InvalidConfig(
                "reserve amount must be at least 1 sat".to_owned(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(CoreError::InvalidConfig(
                "poll interval must be non-zero".to_owned(),
            ));
        }
        if !self.network.accepts_address(&self.treasury_address) {
            return Err(CoreError::InvalidConfig(format!(
                "treasury address `{}` is not a {} address",
                self.treasury_address, self.network.name
            )));
        }
        Ok(())
    }
}

pub fn parse_contract(s: &str) -> Result<QualifiedContractIdentifier, CoreError> {
    clarity::parse_contract_id(s).map_err(|e| CoreError::InvalidConfig(e.to_string()))
}
