use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};

use crate::error::{ApiError, CoreError};
use crate::header::BlockHeaderFields;
use crate::merkle::MerkleProof;
use crate::types::{BlockHeight, TxStatus, Utxo};

use super::BlockExplorer;

/// A mock explorer for testing. Serves canned data populated via the
/// builder pattern. Status answers can be scripted as a sequence so a
/// transaction can move from pending to confirmed between polls.
pub struct MockExplorer {
    statuses: Mutex<HashMap<Txid, VecDeque<Result<TxStatus, u16>>>>,
    hexes: HashMap<Txid, String>,
    proofs: HashMap<Txid, MerkleProof>,
    heights: HashMap<BlockHeight, BlockHash>,
    headers: HashMap<BlockHash, BlockHeaderFields>,
    utxos: HashMap<String, Vec<Utxo>>,
    status_calls: AtomicUsize,
}

fn not_found(what: String) -> CoreError {
    CoreError::Explorer(ApiError::Status {
        status: 404,
        body: format!("{what} not found"),
    })
}

impl MockExplorer {
    pub fn builder() -> MockExplorerBuilder {
        MockExplorerBuilder {
            statuses: HashMap::new(),
            hexes: HashMap::new(),
            proofs: HashMap::new(),
            heights: HashMap::new(),
            headers: HashMap::new(),
            utxos: HashMap::new(),
        }
    }

    /// Number of `tx_status` calls served so far.
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

pub struct MockExplorerBuilder {
    statuses: HashMap<Txid, VecDeque<Result<TxStatus, u16>>>,
    hexes: HashMap<Txid, String>,
    proofs: HashMap<Txid, MerkleProof>,
    heights: HashMap<BlockHeight, BlockHash>,
    headers: HashMap<BlockHash, BlockHeaderFields>,
    utxos: HashMap<String, Vec<Utxo>>,
}

impl MockExplorerBuilder {
    /// Append a status answer. The last queued answer repeats forever.
    pub fn with_status(mut self, txid: Txid, status: TxStatus) -> Self {
        self.statuses.entry(txid).or_default().push_back(Ok(status));
        self
    }

    /// Append an HTTP failure with `status` to the answer queue of `txid`.
    pub fn with_status_failure(mut self, txid: Txid, status: u16) -> Self {
        self.statuses.entry(txid).or_default().push_back(Err(status));
        self
    }

    pub fn with_tx_hex(mut self, txid: Txid, hex: impl Into<String>) -> Self {
        self.hexes.insert(txid, hex.into());
        self
    }

    pub fn with_proof(mut self, txid: Txid, proof: MerkleProof) -> Self {
        self.proofs.insert(txid, proof);
        self
    }

    /// Register a block: its hash at `height` and its header.
    pub fn with_block(
        mut self,
        height: BlockHeight,
        hash: BlockHash,
        header: BlockHeaderFields,
    ) -> Self {
        self.heights.insert(height, hash);
        self.headers.insert(hash, header);
        self
    }

    pub fn with_utxos(mut self, address: &str, utxos: Vec<Utxo>) -> Self {
        self.utxos.insert(address.to_owned(), utxos);
        self
    }

    pub fn build(self) -> MockExplorer {
        MockExplorer {
            statuses: Mutex::new(self.statuses),
            hexes: self.hexes,
            proofs: self.proofs,
            heights: self.heights,
            headers: self.headers,
            utxos: self.utxos,
            status_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BlockExplorer for MockExplorer {
    async fn tx_status(&self, txid: &Txid) -> Result<TxStatus, CoreError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().expect("mock lock poisoned");
        let queue = statuses
            .get_mut(txid)
            .ok_or_else(|| not_found(format!("tx {txid}")))?;
        let answer = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match answer {
            Some(Ok(status)) => Ok(status),
            Some(Err(code)) => Err(CoreError::Explorer(ApiError::Status {
                status: code,
                body: "scripted failure".into(),
            })),
            None => Err(not_found(format!("tx {txid}"))),
        }
    }

    async fn tx_hex(&self, txid: &Txid) -> Result<String, CoreError> {
        self.hexes
            .get(txid)
            .cloned()
            .ok_or_else(|| not_found(format!("tx {txid}")))
    }

    async fn merkle_proof(&self, txid: &Txid) -> Result<MerkleProof, CoreError> {
        self.proofs
            .get(txid)
            .cloned()
            .ok_or_else(|| not_found(format!("proof for {txid}")))
    }

    async fn block_hash_at_height(&self, height: BlockHeight) -> Result<BlockHash, CoreError> {
        self.heights
            .get(&height)
            .copied()
            .ok_or_else(|| not_found(format!("block at height {height}")))
    }

    async fn block_header(&self, hash: &BlockHash) -> Result<BlockHeaderFields, CoreError> {
        self.headers
            .get(hash)
            .cloned()
            .ok_or_else(|| not_found(format!("block {hash}")))
    }

    async fn address_utxos(&self, address: &str) -> Result<Vec<Utxo>, CoreError> {
        Ok(self.utxos.get(address).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::txid_from_byte;

    #[tokio::test]
    async fn scripted_statuses_advance_and_last_one_sticks() {
        let txid = txid_from_byte(1);
        let confirmed = TxStatus {
            confirmed: true,
            ..TxStatus::unconfirmed()
        };
        let explorer = MockExplorer::builder()
            .with_status_failure(txid, 503)
            .with_status(txid, TxStatus::unconfirmed())
            .with_status(txid, confirmed.clone())
            .build();

        assert!(explorer.tx_status(&txid).await.is_err());
        assert!(!explorer.tx_status(&txid).await.unwrap().confirmed);
        assert!(explorer.tx_status(&txid).await.unwrap().confirmed);
        assert_eq!(explorer.tx_status(&txid).await.unwrap(), confirmed);
        assert_eq!(explorer.status_calls(), 4);
    }

    #[tokio::test]
    async fn unknown_entries_are_not_found() {
        let explorer = MockExplorer::builder().build();
        let err = explorer.tx_hex(&txid_from_byte(9)).await.expect_err("unknown");
        assert!(matches!(
            err,
            CoreError::Explorer(ApiError::Status { status: 404, .. })
        ));
        assert!(explorer.address_utxos("tb1q").await.unwrap().is_empty());
    }
}
