//! Block-explorer abstraction layer.
//!
//! Defines the [`BlockExplorer`] trait and provides an Esplora REST
//! implementation ([`EsploraClient`]) plus a test mock (`mock::MockExplorer`).

mod esplora;
#[cfg(test)]
pub mod mock;

pub use esplora::EsploraClient;

use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};

use crate::error::CoreError;
use crate::header::BlockHeaderFields;
use crate::merkle::MerkleProof;
use crate::types::{BlockHeight, TxStatus, Utxo};

/// The read-only explorer endpoints the reserve/mint flow needs.
#[async_trait]
pub trait BlockExplorer: Send + Sync {
    /// Confirmation status of a transaction.
    async fn tx_status(&self, txid: &Txid) -> Result<TxStatus, CoreError>;

    /// Raw transaction hex, witness data included.
    async fn tx_hex(&self, txid: &Txid) -> Result<String, CoreError>;

    /// Merkle inclusion proof for a confirmed transaction.
    async fn merkle_proof(&self, txid: &Txid) -> Result<MerkleProof, CoreError>;

    async fn block_hash_at_height(&self, height: BlockHeight) -> Result<BlockHash, CoreError>;

    async fn block_header(&self, hash: &BlockHash) -> Result<BlockHeaderFields, CoreError>;

    /// Unspent outputs paying `address`, confirmed or not.
    async fn address_utxos(&self, address: &str) -> Result<Vec<Utxo>, CoreError>;
}
