//! The reserve → wait → mint flow.
//!
//! [`AppContext`] owns configuration, the explorer and node clients, and
//! the persisted session. Every user action is one async handler on it; the
//! CLI and the HTTP API both call these handlers.

use std::sync::Arc;

use bitcoin::hex::{DisplayHex, FromHex};
use bitcoin::Txid;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clarity::{ClarityValue, ClarityValueExt, PrincipalData, StandardPrincipalData};
use crate::config::Config;
use crate::contract::{ContractCall, ContractCallPayload};
use crate::error::{ApiError, CoreError, ParseError};
use crate::explorer::BlockExplorer;
use crate::header::BlockHeaderFields;
use crate::merkle::MerkleProof;
use crate::node::StacksNode;
use crate::poller::{PeriodicTask, StopReason};
use crate::store::{Session, TxState};
use crate::tx;
use crate::types::BlockDetails;

// ==============================================================================
// Stage and Button
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeStage {
    Reserve,
    Pending,
    Mintable,
}

impl BadgeStage {
    /// Stage implied by the stored txid and raw status string. Any status
    /// other than `pending` or `confirmed` falls back to `Reserve`.
    pub fn from_session(txid: Option<&Txid>, status: Option<&str>) -> Self {
        match (txid, status) {
            (Some(_), Some("pending")) => Self::Pending,
            (Some(_), Some("confirmed")) => Self::Mintable,
            _ => Self::Reserve,
        }
    }

    pub fn button(self, reserve_amount: u64) -> ButtonState {
        match self {
            Self::Reserve => ButtonState {
                text: "Reserve Your Bitbadge",
                instructions: format!(
                    "Step 1: Reserve your Bitbadge by sending {reserve_amount} sats"
                ),
                enabled: true,
            },
            Self::Pending => ButtonState {
                text: "Transaction Pending",
                instructions: "Step 2: Wait for your transaction to confirm".to_owned(),
                enabled: false,
            },
            Self::Mintable => ButtonState {
                text: "Mint Your Bitbadge",
                instructions: "Step 3: Mint your Bitbadge".to_owned(),
                enabled: true,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonState {
    pub text: &'static str,
    pub instructions: String,
    pub enabled: bool,
}

// ==============================================================================
// Handler Results
// ==============================================================================

/// The `sendTransfer` request handed to the Bitcoin wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    pub address: String,
    /// Satoshis, rendered as a decimal string the way wallets expect.
    pub amount: String,
}

/// Snapshot of the session plus the stage it implies.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub stage: BadgeStage,
    pub button: ButtonState,
    pub txid: Option<Txid>,
    pub tx_status: Option<String>,
    pub block_details: Option<BlockDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    /// Nothing reserved, nothing to poll.
    NoReservation,
    Pending { txid: Txid },
    Confirmed { txid: Txid, block: BlockDetails },
}

impl PollOutcome {
    /// Whether polling can stop.
    pub fn is_done(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }
}

/// A mint call ready for the wallet.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedMint {
    #[serde(skip)]
    pub call: ContractCall,
    pub payload: ContractCallPayload,
    /// Local merkle preflight result; the contract remains the authority.
    pub inclusion_verified: bool,
}

/// Result of the three-step read-only merkle check.
#[derive(Debug, Clone, Serialize)]
pub struct MerkleCheck {
    pub reversed_txid: String,
    pub merkle_root: String,
    pub result: String,
}

/// Everything the contract needs about a confirmed payment.
struct ConfirmedPayment {
    txid: Txid,
    block: BlockDetails,
    raw_hex: String,
    submission: Vec<u8>,
    header: BlockHeaderFields,
    proof: MerkleProof,
}

// ==============================================================================
// Application Context
// ==============================================================================

pub struct AppContext {
    config: Config,
    explorer: Arc<dyn BlockExplorer>,
    node: Arc<dyn StacksNode>,
    session: Mutex<Session>,
}

impl AppContext {
    pub fn new(
        config: Config,
        explorer: Arc<dyn BlockExplorer>,
        node: Arc<dyn StacksNode>,
        session: Session,
    ) -> Self {
        Self {
            config,
            explorer,
            node,
            session: Mutex::new(session),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn view(&self) -> SessionView {
        let session = self.session.lock().await;
        let txid = session.txid();
        let tx_status = session.raw_tx_status();
        let stage = BadgeStage::from_session(txid.as_ref(), tx_status.as_deref());
        SessionView {
            stage,
            button: stage.button(self.config.reserve_amount),
            txid,
            tx_status,
            block_details: session.block_details(),
        }
    }

    pub fn transfer_request(&self) -> TransferRequest {
        TransferRequest {
            address: self.config.treasury_address.clone(),
            amount: self.config.reserve_amount.to_string(),
        }
    }

    /// Record the txid the wallet returned for the reservation payment.
    ///
    /// Artifacts of any earlier reservation are dropped first.
    pub async fn reserve(&self, txid: Txid) -> Result<(), CoreError> {
        let mut session = self.session.lock().await;
        session.clear()?;
        session.set_txid(&txid)?;
        session.set_tx_state(TxState::Pending)?;
        info!(%txid, "reservation recorded");
        Ok(())
    }

    /// One status check. On confirmation the block details, raw transaction
    /// and merkle proof are stored before the status flips to `confirmed`.
    pub async fn poll_once(&self) -> Result<PollOutcome, CoreError> {
        let (txid, state, stored_block) = {
            let session = self.session.lock().await;
            (session.txid(), session.tx_state(), session.block_details())
        };
        let Some(txid) = txid else {
            return Ok(PollOutcome::NoReservation);
        };
        if let (Some(TxState::Confirmed), Some(block)) = (state, stored_block) {
            return Ok(PollOutcome::Confirmed { txid, block });
        }

        let status = self.explorer.tx_status(&txid).await?;
        if !status.confirmed {
            debug!(%txid, "payment still pending");
            return Ok(PollOutcome::Pending { txid });
        }
        let block = status.block_details().ok_or_else(|| {
            CoreError::Explorer(ApiError::InvalidResponse(format!(
                "tx {txid} confirmed without block height and hash"
            )))
        })?;

        let (raw_hex, proof) = futures::try_join!(
            self.explorer.tx_hex(&txid),
            self.explorer.merkle_proof(&txid)
        )?;

        let mut session = self.session.lock().await;
        if session.txid() != Some(txid) {
            debug!(%txid, "reservation changed while polling; discarding result");
            return Ok(PollOutcome::NoReservation);
        }
        session.set_block_details(&block)?;
        session.set_tx_raw(&raw_hex)?;
        session.set_merkle_proof(&proof)?;
        session.set_tx_state(TxState::Confirmed)?;
        info!(
            %txid,
            height = %block.block_height,
            block_hash = %block.block_hash,
            "payment confirmed"
        );
        Ok(PollOutcome::Confirmed { txid, block })
    }

    /// Poll every configured interval until the payment confirms.
    pub fn watch<S>(self: &Arc<Self>, on_stop: S) -> PeriodicTask
    where
        S: FnOnce(StopReason) + Send + 'static,
    {
        let ctx = Arc::clone(self);
        PeriodicTask::start(
            self.config.poll_interval,
            move || {
                let ctx = Arc::clone(&ctx);
                async move { ctx.poll_once().await.map(|outcome| outcome.is_done()) }
            },
            on_stop,
        )
    }

    /// Build the `mint` call for `recipient`.
    ///
    /// With `expected_sender`, the payment's first input must derive that
    /// address or the mint is refused.
    pub async fn prepare_mint(
        &self,
        recipient: PrincipalData,
        expected_sender: Option<&str>,
    ) -> Result<PreparedMint, CoreError> {
        let payment = self.confirmed_payment().await?;

        if let Some(expected) = expected_sender {
            if !tx::verify_sender(&payment.raw_hex, expected, &self.config.network) {
                return Err(CoreError::SenderMismatch(expected.to_owned()));
            }
            debug!(sender = expected, "payment sender verified");
        }

        let inclusion_verified =
            match payment.proof.verify_inclusion(&payment.txid, &payment.header.merkle_root) {
                Ok(true) => true,
                Ok(false) => {
                    warn!(
                        txid = %payment.txid,
                        "merkle proof does not lead to the header's merkle root"
                    );
                    false
                }
                Err(e) => {
                    warn!(txid = %payment.txid, error = %e, "merkle preflight failed");
                    false
                }
            };

        let call = ContractCall::Mint {
            recipient,
            height: payment.block.block_height,
            tx: payment.submission,
            header: payment.header,
            proof: payment.proof.to_argument(self.config.sibling_order)?,
        };
        let payload = call.payload(&self.config.contracts)?;
        info!(
            txid = %payment.txid,
            contract = %call.contract(&self.config.contracts),
            "mint call prepared"
        );
        Ok(PreparedMint {
            call,
            payload,
            inclusion_verified,
        })
    }

    /// `was-tx-mined-compact`, evaluated read-only as `sender`.
    pub async fn check_mined(
        &self,
        sender: &StandardPrincipalData,
    ) -> Result<ClarityValue, CoreError> {
        let payment = self.confirmed_payment().await?;
        let call = ContractCall::WasTxMinedCompact {
            height: payment.block.block_height,
            tx: payment.submission,
            header: payment.header,
            proof: payment.proof.to_argument(self.config.sibling_order)?,
        };
        let result = self.read_only(&call, sender).await?;
        info!(txid = %payment.txid, %result, "was-tx-mined-compact");
        Ok(result)
    }

    /// Reverse the txid, parse the header and verify the proof, each through
    /// the helper contract.
    pub async fn verify_merkle(
        &self,
        sender: &StandardPrincipalData,
    ) -> Result<MerkleCheck, CoreError> {
        let payment = self.confirmed_payment().await?;

        let reversed = self
            .read_only(
                &ContractCall::GetReversedTxid {
                    tx: payment.submission,
                },
                sender,
            )
            .await?;
        let reversed_txid = buffer32(reversed.response_inner(), "get-reversed-txid")?;

        let parsed = self
            .read_only(
                &ContractCall::ParseBlockHeader {
                    header: payment.header,
                },
                sender,
            )
            .await?;
        let merkle_root_value = parsed
            .response_inner()
            .tuple_field("merkle-root")
            .ok_or_else(|| {
                CoreError::Node(ApiError::InvalidResponse(format!(
                    "parse-block-header returned no merkle-root: {parsed}"
                )))
            })?;
        let merkle_root = buffer32(merkle_root_value, "parse-block-header merkle-root")?;

        let verified = self
            .read_only(
                &ContractCall::VerifyMerkleProof {
                    reversed_txid,
                    merkle_root,
                    proof: payment.proof.to_argument(self.config.sibling_order)?,
                },
                sender,
            )
            .await?;
        info!(txid = %payment.txid, result = %verified, "verify-merkle-proof");

        Ok(MerkleCheck {
            reversed_txid: reversed_txid.as_slice().to_lower_hex_string(),
            merkle_root: merkle_root.as_slice().to_lower_hex_string(),
            result: verified.to_string(),
        })
    }

    /// Whether the treasury address holds an output of the reservation
    /// payment worth at least the reserve amount.
    pub async fn payment_received(&self) -> Result<bool, CoreError> {
        let txid = self
            .session
            .lock()
            .await
            .txid()
            .ok_or(CoreError::MissingSession("txid"))?;
        let utxos = self
            .explorer
            .address_utxos(&self.config.treasury_address)
            .await?;
        let received = utxos
            .iter()
            .any(|u| u.txid == txid && u.value >= self.config.reserve_amount);
        debug!(%txid, utxos = utxos.len(), received, "treasury utxo check");
        Ok(received)
    }

    /// Forget the reservation.
    pub async fn reset(&self) -> Result<(), CoreError> {
        self.session.lock().await.clear()?;
        info!("session cleared");
        Ok(())
    }

    // ==========================================================================
    // Internals
    // ==========================================================================

    async fn confirmed_payment(&self) -> Result<ConfirmedPayment, CoreError> {
        let (txid, block, raw_hex, proof) = {
            let session = self.session.lock().await;
            let txid = session.txid().ok_or(CoreError::MissingSession("txid"))?;
            if session.tx_state() != Some(TxState::Confirmed) {
                return Err(CoreError::NotConfirmed(txid));
            }
            (
                txid,
                session
                    .block_details()
                    .ok_or(CoreError::MissingSession("blockDetails"))?,
                session.tx_raw().ok_or(CoreError::MissingSession("txRaw"))?,
                session
                    .merkle_proof()
                    .ok_or(CoreError::MissingSession("txMerkleProof"))?,
            )
        };

        let block_hash = self
            .explorer
            .block_hash_at_height(block.block_height)
            .await?;
        if block_hash != block.block_hash {
            warn!(
                height = %block.block_height,
                stored = %block.block_hash,
                current = %block_hash,
                "block at payment height changed since confirmation"
            );
        }
        let header = self.explorer.block_header(&block_hash).await?;

        let submission_hex = tx::submission_hex(&raw_hex)?;
        let submission =
            Vec::<u8>::from_hex(&submission_hex).map_err(|e| ParseError::Hex(e.to_string()))?;

        Ok(ConfirmedPayment {
            txid,
            block,
            raw_hex,
            submission,
            header,
            proof,
        })
    }

    async fn read_only(
        &self,
        call: &ContractCall,
        sender: &StandardPrincipalData,
    ) -> Result<ClarityValue, CoreError> {
        let args = call.args()?;
        self.node
            .call_read_only(
                call.contract(&self.config.contracts),
                call.function_name(),
                sender,
                &args,
            )
            .await
    }
}

fn buffer32(value: &ClarityValue, what: &str) -> Result<[u8; 32], CoreError> {
    value
        .buffer_bytes()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .ok_or_else(|| {
            CoreError::Node(ApiError::InvalidResponse(format!(
                "{what}: expected a 32-byte buffer, got {value}"
            )))
        })
}
