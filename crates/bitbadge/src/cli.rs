use std::path::PathBuf;
use std::time::Duration;

use bitcoin::Txid;
use clap::{Args, Parser, Subcommand};

use bitbadge_core::clarity::{
    parse_contract_id, parse_principal, parse_standard_principal, PrincipalData,
    QualifiedContractIdentifier, StandardPrincipalData,
};
use bitbadge_core::config::{
    Config, DEFAULT_BADGE_CONTRACT, DEFAULT_ESPLORA_URL, DEFAULT_HELPER_CONTRACT,
    DEFAULT_MINED_CHECK_CONTRACT, DEFAULT_NODE_URL, DEFAULT_RESERVE_AMOUNT,
    DEFAULT_TREASURY_ADDRESS,
};
use bitbadge_core::contract::ContractSet;
use bitbadge_core::merkle::SiblingOrder;
use bitbadge_core::NetworkParams;

/// Bitbadge: reserve a badge with a Bitcoin testnet payment, then mint it
/// on Stacks with a merkle proof of that payment.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct Settings {
    /// Esplora REST base URL.
    #[arg(long, global = true, default_value = DEFAULT_ESPLORA_URL, env = "BITBADGE_ESPLORA_URL")]
    pub esplora_url: String,

    /// Cap on explorer requests per second (unlimited when omitted).
    #[arg(long, global = true, env = "BITBADGE_EXPLORER_RPS")]
    pub explorer_rps: Option<u32>,

    /// Stacks node RPC base URL.
    #[arg(long, global = true, default_value = DEFAULT_NODE_URL, env = "BITBADGE_NODE_URL")]
    pub node_url: String,

    /// Bitcoin network used for address derivation.
    #[arg(long, global = true, default_value = "testnet", env = "BITBADGE_NETWORK")]
    pub network: NetworkParams,

    /// Address the reservation payment is sent to.
    #[arg(long, global = true, default_value = DEFAULT_TREASURY_ADDRESS, env = "BITBADGE_TREASURY")]
    pub treasury: String,

    /// Reservation amount in sats.
    #[arg(long, global = true, default_value_t = DEFAULT_RESERVE_AMOUNT, env = "BITBADGE_AMOUNT")]
    pub amount: u64,

    /// Contract exposing `mint`.
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_BADGE_CONTRACT,
        env = "BITBADGE_BADGE_CONTRACT",
        value_parser = parse_contract_id
    )]
    pub badge_contract: QualifiedContractIdentifier,

    /// Bitcoin helper contract used by `verify-merkle`.
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_HELPER_CONTRACT,
        env = "BITBADGE_HELPER_CONTRACT",
        value_parser = parse_contract_id
    )]
    pub helper_contract: QualifiedContractIdentifier,

    /// Contract exposing `was-tx-mined-compact`.
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_MINED_CHECK_CONTRACT,
        env = "BITBADGE_MINED_CHECK_CONTRACT",
        value_parser = parse_contract_id
    )]
    pub mined_check_contract: QualifiedContractIdentifier,

    /// Byte order of merkle siblings passed to contracts: as-served or reversed.
    #[arg(long, global = true, default_value = "as-served", env = "BITBADGE_SIBLING_ORDER")]
    pub sibling_order: SiblingOrder,

    /// Seconds between confirmation checks.
    #[arg(long, global = true, default_value = "10", env = "BITBADGE_POLL_INTERVAL")]
    pub poll_interval: u64,

    /// Session file keeping the reservation between runs.
    #[arg(
        long,
        global = true,
        default_value = ".bitbadge/session.json",
        env = "BITBADGE_SESSION_FILE"
    )]
    pub session_file: PathBuf,
}

impl Settings {
    pub fn to_config(&self) -> Config {
        Config {
            esplora_url: self.esplora_url.clone(),
            explorer_requests_per_second: self.explorer_rps,
            node_url: self.node_url.clone(),
            network: self.network,
            treasury_address: self.treasury.clone(),
            reserve_amount: self.amount,
            contracts: ContractSet {
                badge: self.badge_contract.clone(),
                helper: self.helper_contract.clone(),
                mined_check: self.mined_check_contract.clone(),
            },
            sibling_order: self.sibling_order,
            poll_interval: Duration::from_secs(self.poll_interval),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Print a transaction with witness data, script-sigs and sequences removed.
    Strip {
        /// Raw transaction hex.
        hex: String,
    },

    /// Check whether a transaction's first input was signed by ADDRESS.
    VerifySender {
        /// Raw transaction hex, witness included.
        hex: String,
        /// Expected P2WPKH address.
        address: String,
    },

    /// Show the stored reservation and the current step.
    Status,

    /// Print the wallet transfer request for the reservation payment.
    Transfer,

    /// Record the txid your wallet returned for the reservation payment.
    Reserve { txid: Txid },

    /// Check the reservation payment's confirmation once.
    Poll,

    /// Poll until the reservation payment confirms (Ctrl-C to stop).
    Watch,

    /// Print the `mint` contract call for your wallet.
    Mint {
        /// Stacks principal receiving the badge.
        #[arg(long, value_parser = parse_principal)]
        recipient: PrincipalData,
        /// Refuse unless the payment was sent from this Bitcoin address.
        #[arg(long)]
        sender: Option<String>,
    },

    /// Run `was-tx-mined-compact` read-only.
    Check {
        /// Stacks address evaluating the call.
        #[arg(long, env = "BITBADGE_STX_SENDER", value_parser = parse_standard_principal)]
        sender: StandardPrincipalData,
    },

    /// Run the helper contract's txid, header and merkle checks read-only.
    VerifyMerkle {
        /// Stacks address evaluating the calls.
        #[arg(long, env = "BITBADGE_STX_SENDER", value_parser = parse_standard_principal)]
        sender: StandardPrincipalData,
    },

    /// Check whether the treasury received the reservation payment.
    Paid,

    /// Forget the stored reservation.
    Reset,

    /// Serve the local HTTP API.
    Serve {
        /// Address to bind the web server to.
        #[arg(long, default_value = "127.0.0.1", env = "BITBADGE_BIND")]
        bind: String,

        /// Port to listen on.
        #[arg(long, default_value = "3090", env = "BITBADGE_PORT")]
        port: u16,
    },
}
