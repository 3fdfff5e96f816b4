//! Typed contract-call requests for the Bitbadge contracts.
//!
//! Each [`ContractCall`] variant carries already-validated fields, so the
//! Clarity arguments it renders always have the shape the contract expects.

use serde::{Deserialize, Serialize};

use crate::clarity::{
    self, ClarityError, ClarityValue, PrincipalData, QualifiedContractIdentifier,
};
use crate::header::BlockHeaderFields;
use crate::merkle::ProofArgument;
use crate::types::BlockHeight;

// ==============================================================================
// Contract Set
// ==============================================================================

/// The deployed contracts a call can target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSet {
    /// Badge contract exposing `mint`.
    pub badge: QualifiedContractIdentifier,
    /// Bitcoin helper library (`get-reversed-txid`, `parse-block-header`,
    /// `verify-merkle-proof`).
    pub helper: QualifiedContractIdentifier,
    /// Helper revision exposing `was-tx-mined-compact`.
    pub mined_check: QualifiedContractIdentifier,
}

// ==============================================================================
// Calls
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    Mint {
        recipient: PrincipalData,
        height: BlockHeight,
        tx: Vec<u8>,
        header: BlockHeaderFields,
        proof: ProofArgument,
    },
    WasTxMinedCompact {
        height: BlockHeight,
        tx: Vec<u8>,
        header: BlockHeaderFields,
        proof: ProofArgument,
    },
    GetReversedTxid {
        tx: Vec<u8>,
    },
    ParseBlockHeader {
        header: BlockHeaderFields,
    },
    VerifyMerkleProof {
        reversed_txid: [u8; 32],
        merkle_root: [u8; 32],
        proof: ProofArgument,
    },
}

impl ContractCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::Mint { .. } => "mint",
            Self::WasTxMinedCompact { .. } => "was-tx-mined-compact",
            Self::GetReversedTxid { .. } => "get-reversed-txid",
            Self::ParseBlockHeader { .. } => "parse-block-header",
            Self::VerifyMerkleProof { .. } => "verify-merkle-proof",
        }
    }

    /// The contract that defines this call's function.
    pub fn contract<'a>(&self, contracts: &'a ContractSet) -> &'a QualifiedContractIdentifier {
        match self {
            Self::Mint { .. } => &contracts.badge,
            Self::WasTxMinedCompact { .. } => &contracts.mined_check,
            Self::GetReversedTxid { .. }
            | Self::ParseBlockHeader { .. }
            | Self::VerifyMerkleProof { .. } => &contracts.helper,
        }
    }

    /// Positional Clarity arguments.
    pub fn args(&self) -> Result<Vec<ClarityValue>, ClarityError> {
        Ok(match self {
            Self::Mint {
                recipient,
                height,
                tx,
                header,
                proof,
            } => vec![
                ClarityValue::Principal(recipient.clone()),
                clarity::uint(height.0),
                clarity::buffer(tx.clone())?,
                clarity::buffer(header.to_bytes())?,
                proof.to_clarity()?,
            ],
            Self::WasTxMinedCompact {
                height,
                tx,
                header,
                proof,
            } => vec![
                clarity::uint(height.0),
                clarity::buffer(tx.clone())?,
                clarity::buffer(header.to_bytes())?,
                proof.to_clarity()?,
            ],
            Self::GetReversedTxid { tx } => vec![clarity::buffer(tx.clone())?],
            Self::ParseBlockHeader { header } => vec![clarity::buffer(header.to_bytes())?],
            Self::VerifyMerkleProof {
                reversed_txid,
                merkle_root,
                proof,
            } => vec![
                clarity::buffer(*reversed_txid)?,
                clarity::buffer(*merkle_root)?,
                proof.to_clarity()?,
            ],
        })
    }

    /// Render the request a wallet's contract-call prompt accepts.
    pub fn payload(&self, contracts: &ContractSet) -> Result<ContractCallPayload, ClarityError> {
        let contract = self.contract(contracts);
        Ok(ContractCallPayload {
            contract_address: contract.issuer.to_string(),
            contract_name: contract.name.to_string(),
            function_name: self.function_name().to_owned(),
            function_args: self.args()?.iter().map(clarity::to_hex).collect(),
        })
    }
}

/// Wallet contract-call request. Arguments are consensus-serialized hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCallPayload {
    pub contract_address: String,
    pub contract_name: String,
    pub function_name: String,
    pub function_args: Vec<String>,
}
