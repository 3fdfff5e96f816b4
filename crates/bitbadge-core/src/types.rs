//! Shared domain types for explorer responses and session bookkeeping.

use bitcoin::{BlockHash, Txid};
use serde::{Deserialize, Serialize};

// ==============================================================================
// Block Height
// ==============================================================================

/// A Bitcoin block height, wrapped for type safety.
///
/// `#[serde(transparent)]` keeps the JSON representation a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeight(pub u32);

impl From<u32> for BlockHeight {
    fn from(h: u32) -> Self {
        Self(h)
    }
}

impl From<BlockHeight> for u32 {
    fn from(h: BlockHeight) -> Self {
        h.0
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ==============================================================================
// Explorer Responses
// ==============================================================================

/// `GET /tx/{txid}/status`. Height and hash are present once confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStatus {
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<BlockHeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<BlockHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_time: Option<u64>,
}

impl TxStatus {
    pub fn unconfirmed() -> Self {
        Self {
            confirmed: false,
            block_height: None,
            block_hash: None,
            block_time: None,
        }
    }

    /// Block details, only when the explorer reports a confirmed location.
    pub fn block_details(&self) -> Option<BlockDetails> {
        match (self.confirmed, self.block_height, self.block_hash) {
            (true, Some(block_height), Some(block_hash)) => Some(BlockDetails {
                block_height,
                block_hash,
            }),
            _ => None,
        }
    }
}

/// One entry of `GET /address/{address}/utxo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub value: u64,
    pub status: TxStatus,
}

// ==============================================================================
// Session Records
// ==============================================================================

/// Where the reservation payment confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDetails {
    pub block_height: BlockHeight,
    pub block_hash: BlockHash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_status_yields_block_details() {
        let status: TxStatus = serde_json::from_str(
            r#"{"confirmed":true,"block_height":2540123,
                "block_hash":"000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943",
                "block_time":1700000000}"#,
        )
        .unwrap();
        let details = status.block_details().expect("confirmed status has details");
        assert_eq!(details.block_height, BlockHeight(2_540_123));
    }

    #[test]
    fn unconfirmed_status_has_no_details() {
        let status: TxStatus = serde_json::from_str(r#"{"confirmed":false}"#).unwrap();
        assert_eq!(status, TxStatus::unconfirmed());
        assert!(status.block_details().is_none());
    }

    #[test]
    fn block_height_serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&BlockHeight(7)).unwrap(), "7");
    }
}
