use bitcoin::Txid;

use crate::clarity::ClarityError;

/// Malformed input encountered while decoding hex, transactions or headers.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("malformed transaction: {0}")]
    Transaction(String),

    #[error("block header must be 80 bytes, got {0}")]
    HeaderLength(usize),

    #[error("invalid hash: {0}")]
    Hash(String),

    #[error("invalid address: {0}")]
    Address(String),
}

/// Failures talking to an external HTTP API (block explorer or Stacks node).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Clarity(#[from] ClarityError),

    #[error("block explorer failure: {0}")]
    Explorer(ApiError),

    #[error("stacks node failure: {0}")]
    Node(ApiError),

    #[error("read-only call rejected: {0}")]
    ReadOnlyRejected(String),

    #[error("invalid merkle proof: {0}")]
    InvalidProof(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("session is missing `{0}`; complete the earlier steps first")]
    MissingSession(&'static str),

    #[error("transaction {0} is not confirmed yet")]
    NotConfirmed(Txid),

    #[error("transaction sender does not match {0}")]
    SenderMismatch(String),

    #[error("session store failure: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
