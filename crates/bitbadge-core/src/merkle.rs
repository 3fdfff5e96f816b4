//! Merkle inclusion proofs as served by the block explorer and as consumed
//! by the verifying contract.

use std::str::FromStr;

use bitcoin::hashes::{sha256d, Hash};
use bitcoin::hex::FromHex;
use bitcoin::Txid;
use serde::{Deserialize, Serialize};

use crate::clarity::{self, ClarityError, ClarityValue};
use crate::error::{CoreError, ParseError};

// ==============================================================================
// Sibling Byte Order
// ==============================================================================

/// Byte order of the sibling hashes handed to the contract.
///
/// The explorer serves hashes in display (reversed) order. `AsServed` passes
/// them through unchanged; `Reversed` flips each into internal order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiblingOrder {
    #[default]
    AsServed,
    Reversed,
}

impl FromStr for SiblingOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "as-served" => Ok(Self::AsServed),
            "reversed" => Ok(Self::Reversed),
            other => Err(format!(
                "unknown sibling order `{other}`; expected as-served or reversed"
            )),
        }
    }
}

// ==============================================================================
// Explorer Proof
// ==============================================================================

/// `GET /tx/{txid}/merkle-proof`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u32>,
    /// Sibling hashes from leaf to root, display-order hex.
    pub merkle: Vec<String>,
    pub pos: u64,
}

impl MerkleProof {
    pub fn depth(&self) -> usize {
        self.merkle.len()
    }

    /// Sibling hashes decoded exactly as served.
    pub fn served_hashes(&self) -> Result<Vec<[u8; 32]>, ParseError> {
        self.merkle
            .iter()
            .map(|hex| {
                <[u8; 32]>::from_hex(hex.trim())
                    .map_err(|e| ParseError::Hash(format!("merkle sibling `{hex}`: {e}")))
            })
            .collect()
    }

    /// Build the contract's proof tuple with the chosen sibling byte order.
    pub fn to_argument(&self, order: SiblingOrder) -> Result<ProofArgument, CoreError> {
        let mut hashes = self.served_hashes()?;
        if order == SiblingOrder::Reversed {
            for hash in &mut hashes {
                hash.reverse();
            }
        }
        ProofArgument::new(self.pos, hashes, self.depth() as u64)
    }

    /// Fold the path from `txid` to a root in internal byte order.
    pub fn compute_root(&self, txid: &Txid) -> Result<[u8; 32], CoreError> {
        // Validates depth against position before hashing.
        ProofArgument::new(self.pos, self.served_hashes()?, self.depth() as u64)?;

        let mut current = txid.to_byte_array();
        let mut index = self.pos;
        for mut sibling in self.served_hashes()? {
            sibling.reverse();
            let mut preimage = [0u8; 64];
            if index & 1 == 0 {
                preimage[..32].copy_from_slice(&current);
                preimage[32..].copy_from_slice(&sibling);
            } else {
                preimage[..32].copy_from_slice(&sibling);
                preimage[32..].copy_from_slice(&current);
            }
            current = sha256d::Hash::hash(&preimage).to_byte_array();
            index >>= 1;
        }
        Ok(current)
    }

    /// Local preflight: does the path lead from `txid` to `merkle_root`
    /// (internal byte order, as found in the header)?
    pub fn verify_inclusion(&self, txid: &Txid, merkle_root: &[u8; 32]) -> Result<bool, CoreError> {
        Ok(&self.compute_root(txid)? == merkle_root)
    }
}

// ==============================================================================
// Contract Proof Argument
// ==============================================================================

/// `{tx-index: uint, hashes: (list buff), tree-depth: uint}`.
///
/// The declared depth always equals the number of sibling hashes and the
/// index always fits a tree of that depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofArgument {
    tx_index: u64,
    hashes: Vec<[u8; 32]>,
    tree_depth: u64,
}

impl ProofArgument {
    pub fn new(tx_index: u64, hashes: Vec<[u8; 32]>, tree_depth: u64) -> Result<Self, CoreError> {
        if tree_depth != hashes.len() as u64 {
            return Err(CoreError::InvalidProof(format!(
                "declared tree depth {tree_depth} but {} sibling hashes",
                hashes.len()
            )));
        }
        if tree_depth < 64 && tx_index >> tree_depth != 0 {
            return Err(CoreError::InvalidProof(format!(
                "tx index {tx_index} does not fit a tree of depth {tree_depth}"
            )));
        }
        Ok(Self {
            tx_index,
            hashes,
            tree_depth,
        })
    }

    pub fn tx_index(&self) -> u64 {
        self.tx_index
    }

    pub fn hashes(&self) -> &[[u8; 32]] {
        &self.hashes
    }

    pub fn tree_depth(&self) -> u64 {
        self.tree_depth
    }

    /// `{ tx-index: uint, hashes: (list buff-32), tree-depth: uint }`
    pub fn to_clarity(&self) -> Result<ClarityValue, ClarityError> {
        let hashes = self
            .hashes
            .iter()
            .map(|h| clarity::buffer(*h))
            .collect::<Result<Vec<_>, _>>()?;
        clarity::tuple([
            ("tx-index", clarity::uint(self.tx_index)),
            ("hashes", clarity::list(hashes)?),
            ("tree-depth", clarity::uint(self.tree_depth)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clarity::ClarityValueExt;
    use crate::header::BlockHeaderFields;
    use crate::test_util::{txid_from_byte, TESTNET_GENESIS_HEADER_HEX};

    fn display_hex(internal: [u8; 32]) -> String {
        Txid::from_byte_array(internal).to_string()
    }

    fn four_leaf_block() -> (Vec<Txid>, [u8; 32]) {
        let txids: Vec<Txid> = (1..=4).map(txid_from_byte).collect();
        let root: sha256d::Hash =
            bitcoin::merkle_tree::calculate_root(txids.iter().map(|t| t.to_raw_hash()))
                .expect("non-empty leaf set has a root");
        (txids, root.to_byte_array())
    }

    fn parent(left: &Txid, right: &Txid) -> [u8; 32] {
        let mut preimage = [0u8; 64];
        preimage[..32].copy_from_slice(left.as_byte_array());
        preimage[32..].copy_from_slice(right.as_byte_array());
        sha256d::Hash::hash(&preimage).to_byte_array()
    }

    #[test]
    fn parses_explorer_json() {
        let proof: MerkleProof = serde_json::from_str(
            r#"{"block_height":2540123,"merkle":["aa","bb","cc"],"pos":3}"#,
        )
        .unwrap();
        assert_eq!(proof.block_height, Some(2_540_123));
        assert_eq!(proof.pos, 3);
        assert_eq!(proof.depth(), 3);
    }

    #[test]
    fn depth_follows_sibling_count() {
        let proof = MerkleProof {
            block_height: None,
            merkle: vec![display_hex([1; 32]), display_hex([2; 32]), display_hex([3; 32])],
            pos: 3,
        };
        let arg = proof.to_argument(SiblingOrder::AsServed).unwrap();
        assert_eq!(arg.tree_depth(), 3);
        assert_eq!(arg.tx_index(), 3);
    }

    #[test]
    fn rejects_depth_that_disagrees_with_siblings() {
        let err = ProofArgument::new(3, vec![[0; 32]; 3], 2).expect_err("depth mismatch");
        assert!(err.to_string().contains("declared tree depth 2 but 3 sibling hashes"));
    }

    #[test]
    fn rejects_index_outside_tree() {
        assert!(ProofArgument::new(8, vec![[0; 32]; 3], 3).is_err());
        assert!(ProofArgument::new(7, vec![[0; 32]; 3], 3).is_ok());
    }

    #[test]
    fn reversed_order_flips_each_sibling() {
        let mut served = [0u8; 32];
        served[0] = 0xaa;
        let proof = MerkleProof {
            block_height: None,
            merkle: vec![bitcoin::hex::DisplayHex::to_lower_hex_string(&served[..])],
            pos: 0,
        };
        let as_served = proof.to_argument(SiblingOrder::AsServed).unwrap();
        let reversed = proof.to_argument(SiblingOrder::Reversed).unwrap();
        assert_eq!(as_served.hashes()[0][0], 0xaa);
        assert_eq!(reversed.hashes()[0][31], 0xaa);
    }

    #[test]
    fn verifies_inclusion_in_four_leaf_tree() {
        let (txids, root) = four_leaf_block();
        let proof = MerkleProof {
            block_height: None,
            merkle: vec![txids[2].to_string(), display_hex(parent(&txids[0], &txids[1]))],
            pos: 3,
        };
        assert!(proof.verify_inclusion(&txids[3], &root).unwrap());
        assert!(!proof.verify_inclusion(&txids[2], &root).unwrap());

        let wrong_pos = MerkleProof { pos: 2, ..proof };
        assert!(!wrong_pos.verify_inclusion(&txids[3], &root).unwrap());
    }

    #[test]
    fn single_transaction_block_root_is_the_txid() {
        let header = BlockHeaderFields::from_hex(TESTNET_GENESIS_HEADER_HEX).unwrap();
        let coinbase: Txid = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
            .parse()
            .unwrap();
        let proof = MerkleProof {
            block_height: Some(0),
            merkle: Vec::new(),
            pos: 0,
        };
        assert!(proof.verify_inclusion(&coinbase, &header.merkle_root).unwrap());
    }

    #[test]
    fn malformed_sibling_is_a_parse_error() {
        let proof = MerkleProof {
            block_height: None,
            merkle: vec!["abcd".into()],
            pos: 0,
        };
        assert!(matches!(
            proof.to_argument(SiblingOrder::AsServed),
            Err(CoreError::Parse(ParseError::Hash(_)))
        ));
    }

    #[test]
    fn clarity_tuple_shape() {
        let arg = ProofArgument::new(1, vec![[7; 32]], 1).unwrap();
        let value = arg.to_clarity().unwrap();
        assert_eq!(value.tuple_field("tx-index"), Some(&clarity::uint(1u64)));
        assert_eq!(value.tuple_field("tree-depth"), Some(&clarity::uint(1u64)));
        assert_eq!(
            value.tuple_field("hashes"),
            Some(&clarity::list([clarity::buffer([7u8; 32]).unwrap()]).unwrap())
        );
        // tuple of 3, keys sorted: "hashes" comes first.
        let hex = clarity::to_hex(&value);
        assert!(hex.starts_with("0x0c0000000306686173686573"));
    }
}
