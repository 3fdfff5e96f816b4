//! Shared test helpers for `bitbadge-core` unit tests.
//!
//! Builds small signed-looking segwit transactions, explorer fixtures and
//! block headers so tests across modules share one source of dummy data.

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::hex::FromHex;
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, CompressedPublicKey, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness,
};

// ==============================================================================
// Keys and Addresses
// ==============================================================================

/// Compressed public key of the secret key `1` (the secp256k1 generator).
pub const GENERATOR_PUBKEY_HEX: &str =
    "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

/// P2WPKH address of [`GENERATOR_PUBKEY_HEX`] on testnet.
pub const GENERATOR_TESTNET_ADDRESS: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

/// P2WPKH address of [`GENERATOR_PUBKEY_HEX`] on mainnet.
pub const GENERATOR_MAINNET_ADDRESS: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

pub fn generator_pubkey() -> Vec<u8> {
    Vec::from_hex(GENERATOR_PUBKEY_HEX).expect("static pubkey hex must decode")
}

pub fn generator_key() -> CompressedPublicKey {
    CompressedPublicKey::from_slice(&generator_pubkey()).expect("generator key must be valid")
}

/// A DER-shaped placeholder signature; nothing in this crate checks it.
pub fn dummy_signature() -> Vec<u8> {
    let mut sig = vec![0x30, 0x44, 0x02, 0x20];
    sig.extend_from_slice(&[0x11; 32]);
    sig.extend_from_slice(&[0x02, 0x20]);
    sig.extend_from_slice(&[0x22; 32]);
    sig.push(0x01);
    sig
}

pub fn p2wpkh_witness() -> Witness {
    Witness::from_slice(&[dummy_signature(), generator_pubkey()])
}

// ==============================================================================
// Transactions
// ==============================================================================

/// Create a deterministic `Txid` from a single distinguishing byte.
pub fn txid_from_byte(b: u8) -> Txid {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    Txid::from_byte_array(bytes)
}

pub fn p2wpkh_output(sats: u64, program_byte: u8) -> TxOut {
    let mut script = vec![0x00, 0x14];
    script.extend_from_slice(&[program_byte; 20]);
    TxOut {
        value: Amount::from_sat(sats),
        script_pubkey: ScriptBuf::from_bytes(script),
    }
}

/// One P2WPKH input spending `txid_from_byte(7):1`, paying 100 sats to a
/// treasury-like program and returning change.
pub fn payment_tx(witness: Witness, sequence: Sequence) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::from_consensus(2_540_000),
        input: vec![TxIn {
            previous_output: OutPoint::new(txid_from_byte(7), 1),
            script_sig: ScriptBuf::new(),
            sequence,
            witness,
        }],
        output: vec![p2wpkh_output(100, 0xaa), p2wpkh_output(48_250, 0xbb)],
    }
}

pub fn signed_payment_tx() -> Transaction {
    payment_tx(p2wpkh_witness(), Sequence::MAX)
}

pub fn tx_hex(tx: &Transaction) -> String {
    bitcoin::consensus::encode::serialize_hex(tx)
}

// ==============================================================================
// Block Headers
// ==============================================================================

/// Serialized testnet genesis header (80 bytes).
pub const TESTNET_GENESIS_HEADER_HEX: &str = concat!(
    "01000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "3ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a",
    "dae5494d",
    "ffff001d",
    "1aa4ae18"
);
